//! Simulation-layer tests: S-record loader, functional model, and
//! co-execution.

use pretty_assertions::assert_eq;

use vr4300_core::common::SimError;
use vr4300_core::sim::{CoSim, load_srec};
use vr4300_core::{Bus, Config};

use crate::common::asm::*;
use crate::common::harness::{FunctionalSystem, PROG_BASE, kseg1};

fn test_bus() -> Bus {
    Bus::with_captured_uart(&Config::default()).expect("bus construction")
}

/// Builds a well-formed S-record line for the given type, address and
/// data.
fn srec_line(kind: char, addr_bytes: &[u8], data: &[u8]) -> String {
    let count = addr_bytes.len() + data.len() + 1;
    let mut sum = count as u32;
    let mut line = format!("S{kind}{count:02X}");
    for &b in addr_bytes.iter().chain(data) {
        sum += u32::from(b);
        line.push_str(&format!("{b:02X}"));
    }
    line.push_str(&format!("{:02X}", !(sum as u8)));
    line
}

// ── Loader ──────────────────────────────────────────────────

/// S3 data records land at their 32-bit address; S7 yields the entry.
#[test]
fn srec_data_and_entry() {
    let mut bus = test_bus();
    let image = format!(
        "{}\n{}\n",
        srec_line('3', &[0x00, 0x00, 0x20, 0x00], &[0xEF, 0xBE, 0xAD, 0xDE]),
        srec_line('7', &[0x00, 0x00, 0x10, 0x00], &[]),
    );
    let entry = load_srec(&mut bus, &image).expect("well-formed");
    assert_eq!(entry, Some(0x1000));
    assert_eq!(bus.read_word(0x2000), 0xDEAD_BEEF);
}

/// A corrupted checksum is rejected.
#[test]
fn srec_bad_checksum() {
    let mut bus = test_bus();
    let mut line = srec_line('1', &[0x10, 0x00], &[0xAA]);
    let len = line.len();
    line.replace_range(len - 2..len, "00");
    assert!(matches!(
        load_srec(&mut bus, &line),
        Err(SimError::Image(_))
    ));
}

/// Records beyond the memory image are a bounds error, not a silent
/// wrap.
#[test]
fn srec_out_of_bounds() {
    let mut bus = test_bus();
    let line = srec_line('3', &[0xFF, 0x00, 0x00, 0x00], &[0x01]);
    assert!(matches!(
        load_srec(&mut bus, &line),
        Err(SimError::ImageBounds { .. })
    ));
}

// ── Functional model ────────────────────────────────────────

/// The functional model executes delay slots and annuls branch-likely
/// shadows exactly like the pipeline scenarios require.
#[test]
fn functional_branch_semantics() {
    let mut sys = FunctionalSystem::new();
    sys.run_program(&[
        beq(0, 0, 2),
        addiu(1, 0, 1), // delay slot runs
        addiu(2, 0, 2), // skipped
        addiu(3, 0, 3), // target
    ]);
    assert_eq!(sys.gpr(1), 1);
    assert_eq!(sys.gpr(2), 0);
    assert_eq!(sys.gpr(3), 3);

    let mut sys = FunctionalSystem::new();
    sys.run_program(&[
        addiu(1, 0, 1),
        beql(0, 1, 2),     // not taken
        addiu(1, 0, 0x55), // annulled
        addiu(2, 0, 0x66),
    ]);
    assert_eq!(sys.gpr(1), 1);
    assert_eq!(sys.gpr(2), 0x66);
}

/// DIV by zero does not trap and produces the documented LO/HI
/// convention in the reference model.
#[test]
fn functional_div_by_zero() {
    use vr4300_core::common::reg::{HI, LO};

    let mut sys = FunctionalSystem::new();
    sys.run_program(&[
        addiu(1, 0, 42),
        div(1, 0),
    ]);
    assert_eq!(sys.cpu.regs.read(LO), u64::MAX, "non-negative dividend");
    assert_eq!(sys.cpu.regs.read(HI), 42);
}

// ── Co-execution ────────────────────────────────────────────

/// The two models agree register-for-register over a program mixing
/// arithmetic, branches, memory, and the multiplier.
#[test]
fn cosim_register_agreement() {
    let program = [
        addiu(1, 0, 100),
        addiu(2, 0, 7),
        div(1, 2),
        mflo(3),
        mfhi(4),
        mult(1, 2),
        mflo(5),
        beq(0, 0, 2),
        addiu(6, 0, 11), // delay slot
        addiu(7, 0, 13), // skipped
        slt(8, 2, 1),
        or(9, 3, 4),
        lui(11, 0xA000), // uncached data pointer, shared by both models
        sw(1, 11, 0x7000),
        lw(10, 11, 0x7000),
    ];

    let mut cosim = CoSim::new(&Config::default()).expect("harness");
    for (i, &w) in program.iter().enumerate() {
        cosim.bus.write_word(PROG_BASE + (i as u32) * 4, w, !0);
    }
    let end = kseg1(PROG_BASE) + (program.len() as u64) * 4;
    cosim.set_entry(kseg1(PROG_BASE));

    assert!(cosim.run_functional_until(end, 256), "oracle reached the end");
    assert!(cosim.run_pipeline_until(end, 1024), "pipeline reached the end");
    let mismatches = cosim.compare_registers();
    assert_eq!(mismatches, vec![], "register banks diverged");
}
