//! Whole-machine scenarios driven by the reference Z80-subset engine.

use std::cell::Cell;
use std::fs;
use std::rc::Rc;

use enum_dispatch as _;
use log as _;
use proptest as _;
use ringbuf as _;
use rstest::rstest;
use serde as _;
use thiserror as _;
use toml as _;
use zemu_core::{
    DeviceConfig, Instance, MachineConfig, MemoryConfig, RunState, SerialConfig, TimerConfig,
    Z80Core, NMI_VECTOR,
};

const SERIAL_IN: u8 = 0x00;
const SERIAL_OUT: u8 = 0x01;
const SERIAL_READY: u8 = 0x02;
const TIMER_COUNT: u8 = 0x10;
const TIMER_CONTROL: u8 = 0x11;

fn machine(firmware: &[u8]) -> Instance {
    let config = MachineConfig::new()
        .with_device(DeviceConfig::Rom(
            MemoryConfig::new("rom", 0x0000, 0x4000).with_contents(firmware),
        ))
        .with_device(DeviceConfig::Ram(MemoryConfig::new("ram", 0x8000, 0x8000)))
        .with_device(DeviceConfig::Serial(SerialConfig::new(
            "serial",
            SERIAL_IN,
            SERIAL_OUT,
            SERIAL_READY,
        )))
        .with_device(DeviceConfig::Timer(TimerConfig::new(
            "timer",
            TIMER_COUNT,
            TIMER_CONTROL,
        )));
    Instance::new(&config, Box::new(Z80Core::new())).expect("valid machine")
}

fn serial_output(instance: &mut Instance) -> Vec<u8> {
    instance
        .serial_port("serial")
        .expect("serial port present")
        .gets(None)
}

#[test]
fn single_halt_reports_its_cycle_cost() {
    let mut instance = machine(&[0x76]);

    assert_eq!(instance.run_state(), RunState::Undefined);
    assert_eq!(instance.continue_execution(None), 4);
    assert!(instance.is_halted());
    assert_eq!(instance.cycles(), 4);
}

#[test]
fn breakpoint_then_halt() {
    let mut instance = machine(&[0x00, 0x00, 0x00, 0x76]);
    assert!(instance.set_breakpoint(2));

    assert_eq!(instance.continue_execution(None), 8);
    assert!(instance.is_break());
    assert_eq!(instance.program_counter(), 2);

    assert_eq!(instance.continue_execution(None), 8);
    assert!(instance.is_halted());
    assert_eq!(instance.cycles(), 16);
    assert_eq!(instance.continue_execution(None), 0);
}

#[test]
fn breakpoint_inside_loop_hits_on_every_iteration() {
    // LD B,3 ; loop: INC A ; DJNZ loop ; HALT
    let mut instance = machine(&[0x06, 0x03, 0x3C, 0x10, 0xFD, 0x76]);
    instance.set_breakpoint(2);

    for (expected_b, expected_cycles) in [(3, 7), (2, 17), (1, 17)] {
        assert_eq!(instance.continue_execution(None), expected_cycles);
        assert!(instance.is_break());
        assert_eq!(instance.program_counter(), 2);
        assert_eq!(instance.register("b"), Some(expected_b));
    }

    assert_eq!(instance.continue_execution(None), 4 + 8 + 4);
    assert!(instance.is_halted());
    assert_eq!(instance.register("b"), Some(0));
    assert_eq!(instance.cycles(), 7 + 17 + 17 + 16);
}

#[test]
fn stepping_walks_one_instruction_at_a_time() {
    let mut instance = machine(&[0x3E, 0x07, 0x3C, 0x76]);

    assert_eq!(instance.step(), 7);
    assert_eq!(instance.register("a"), Some(0x07));
    assert_eq!(instance.step(), 4);
    assert_eq!(instance.register("a"), Some(0x08));
    assert_eq!(instance.run_state(), RunState::Running);
    assert_eq!(instance.step(), 4);
    assert!(instance.is_halted());
    assert_eq!(instance.step(), 0);
}

#[test]
fn firmware_echoes_serial_input() {
    // LD B,5
    // wait: IN A,(ready) ; OR A ; JR Z,wait
    //       IN A,(in) ; OUT (out),A ; DJNZ wait
    // HALT
    let firmware = [
        0x06, 0x05, 0xDB, SERIAL_READY, 0xB7, 0x28, 0xFB, 0xDB, SERIAL_IN, 0xD3, SERIAL_OUT, 0x10,
        0xF5, 0x76,
    ];
    let mut instance = machine(&firmware);
    instance
        .serial_port("serial")
        .expect("serial port present")
        .puts(b"Hello");

    instance.continue_execution(Some(100_000));

    assert!(instance.is_halted());
    assert_eq!(serial_output(&mut instance), b"Hello");
}

#[test]
fn firmware_polls_until_input_arrives() {
    let firmware = [
        0x06, 0x01, 0xDB, SERIAL_READY, 0xB7, 0x28, 0xFB, 0xDB, SERIAL_IN, 0xD3, SERIAL_OUT, 0x10,
        0xF5, 0x76,
    ];
    let mut instance = machine(&firmware);

    instance.continue_execution(Some(500));
    assert_eq!(instance.run_state(), RunState::Running);
    assert!(serial_output(&mut instance).is_empty());

    instance
        .serial_port("serial")
        .expect("serial port present")
        .puts(b"?");
    instance.continue_execution(None);
    assert!(instance.is_halted());
    assert_eq!(serial_output(&mut instance), b"?");
}

#[test]
fn timer_nmi_vectors_to_handler() {
    let mut firmware = vec![
        0x31, 0x00, 0x00, // LD SP,0x0000
        0x3E, 20, // LD A,20
        0xD3, TIMER_COUNT, // OUT (count),A
        0x3E, 0x01, // LD A,1
        0xD3, TIMER_CONTROL, // OUT (control),A
        0x18, 0xFE, // JR $
    ];
    firmware.resize(usize::from(NMI_VECTOR), 0x00);
    firmware.extend_from_slice(&[
        0x3E, b'!', // LD A,'!'
        0xD3, SERIAL_OUT, // OUT (out),A
        0x76, // HALT
    ]);
    let mut instance = machine(&firmware);

    let executed = instance.continue_execution(Some(10_000));

    assert!(instance.is_halted());
    assert_eq!(serial_output(&mut instance), b"!");
    assert_eq!(instance.program_counter(), NMI_VECTOR + 5);
    assert_eq!(executed, 10 + 7 + 11 + 7 + 11 + 12 + 11 + 7 + 11 + 4);
    assert_eq!(instance.peek(0xFFFE), 0x0B, "return address points at JR");
}

#[test]
fn tracepoint_fires_once_and_mutates_registers() {
    let mut instance = machine(&[0x00, 0x00, 0x00, 0x76]);
    let hits = Rc::new(Cell::new(0));
    let counter = Rc::clone(&hits);
    instance.register_tracepoint(2, move |context| {
        counter.set(counter.get() + 1);
        assert_eq!(context.program_counter(), 2);
        assert_eq!(context.cycles(), 8);
        assert!(context.set_register("a", 0x42));
    });

    instance.continue_execution(None);

    assert!(instance.is_halted());
    assert_eq!(hits.get(), 1);
    assert_eq!(instance.register("a"), Some(0x42));
}

#[test]
fn tracepoint_and_breakpoint_at_same_address() {
    let mut instance = machine(&[0x00, 0x00, 0x00, 0x76]);
    let hits = Rc::new(Cell::new(0));
    let counter = Rc::clone(&hits);
    instance.register_tracepoint(1, move |_| counter.set(counter.get() + 1));
    instance.set_breakpoint(1);

    instance.continue_execution(None);
    assert!(instance.is_break());
    assert_eq!(hits.get(), 1);

    instance.continue_execution(None);
    assert!(instance.is_halted());
    assert_eq!(hits.get(), 1);
}

#[test]
fn tracepoint_can_patch_rom_with_poke() {
    // NOP ; LD A,(0x0010) ; HALT
    let mut instance = machine(&[0x00, 0x3A, 0x10, 0x00, 0x76]);
    instance.register_tracepoint(1, |context| {
        context.write_memory(0x0010, 0x11);
        assert_eq!(context.peek(0x0010), 0x00);
        context.poke(0x0010, 0x22);
    });

    instance.continue_execution(None);
    assert_eq!(instance.register("a"), Some(0x22));
}

#[rstest]
#[case(Some(1), 4)]
#[case(Some(4), 4)]
#[case(Some(5), 8)]
#[case(None, 16)]
fn cycle_budget_stops_after_crossing_instruction(
    #[case] budget: Option<u64>,
    #[case] expected: u64,
) {
    let mut instance = machine(&[0x00, 0x00, 0x00, 0x76]);
    assert_eq!(instance.continue_execution(budget), expected);
}

#[test]
fn memory_access_honours_rom_protection() {
    let mut instance = machine(&[0xAA]);

    instance.write_memory(0x0000, 0x55);
    assert_eq!(instance.read_memory(0x0000), 0xAA);
    instance.poke(0x0000, 0x55);
    assert_eq!(instance.read_memory(0x0000), 0x55);

    instance.write_memory(0x8000, 0x12);
    assert_eq!(instance.peek(0x8000), 0x12);
    assert_eq!(instance.read_memory(0x4000), 0x00, "unmapped reads zero");
}

#[test]
fn reset_restarts_from_power_on() {
    let mut instance = machine(&[0x3E, 0x09, 0x76]);
    instance.set_breakpoint(0x40);
    instance.continue_execution(None);
    assert!(instance.is_halted());

    instance.reset();
    assert_eq!(instance.run_state(), RunState::Undefined);
    assert_eq!(instance.cycles(), 0);
    assert_eq!(instance.program_counter(), 0);
    assert_eq!(instance.breakpoints().collect::<Vec<_>>(), vec![0x40]);

    assert_eq!(instance.continue_execution(None), 11);
    assert_eq!(instance.register("a"), Some(0x09));
}

#[test]
fn machine_loads_from_toml_description() {
    let dir = tempfile::tempdir().expect("temp dir");
    fs::write(dir.path().join("boot.bin"), [0x3E, b'Z', 0xD3, 0x01, 0x76]).expect("write image");
    let description = r#"
[[device]]
type = "rom"
name = "rom"
base = 0x0000
size = 0x100
image = "boot.bin"

[[device]]
type = "serial"
name = "console"
in_port = 0x00
out_port = 0x01
ready_port = 0x02
capacity = 16
"#;
    let path = dir.path().join("machine.toml");
    fs::write(&path, description).expect("write description");

    let mut instance = Instance::from_file(&path, Box::new(Z80Core::new())).expect("valid machine");
    instance.continue_execution(None);

    assert!(instance.is_halted());
    let console = instance.serial_port("console").expect("console present");
    assert_eq!(console.capacity(), 16);
    assert_eq!(console.gets(None), b"Z");
    assert!(instance.device("rom").is_some());
    assert!(instance.timer("rom").is_none());
}
