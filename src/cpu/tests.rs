use crate::{
    bus::Bus,
    cpu::{
        cpu::{CPU, Interrupt},
        flags::Status,
    },
    error::NesError,
};

struct TestBus {
    mem: [u8; 65536],
}

impl TestBus {
    fn new() -> Self {
        Self { mem: [0; 65536] }
    }
}

impl Bus for TestBus {
    fn read(&mut self, addr: u16) -> u8 {
        self.mem[addr as usize]
    }

    fn write(&mut self, addr: u16, data: u8) {
        self.mem[addr as usize] = data;
    }
}

/// Load `program` at `origin`, point the reset vector at it and reset.
fn boot_at(origin: u16, program: &[u8], setup: impl FnOnce(&mut TestBus)) -> CPU<TestBus> {
    let mut bus = TestBus::new();
    let start = origin as usize;
    bus.mem[start..start + program.len()].copy_from_slice(program);
    bus.mem[0xFFFC] = origin as u8;
    bus.mem[0xFFFD] = (origin >> 8) as u8;
    setup(&mut bus);

    let mut cpu = CPU::new(bus);
    cpu.reset();
    cpu
}

fn boot(program: &[u8]) -> CPU<TestBus> {
    boot_at(0x8000, program, |_| {})
}

fn run(cpu: &mut CPU<TestBus>, steps: usize) {
    for _ in 0..steps {
        cpu.step().unwrap();
    }
}

#[test]
fn reset_loads_vector_and_power_on_state() {
    let cpu = boot(&[]);
    assert_eq!(cpu.pc, 0x8000);
    assert_eq!(cpu.sp, 0xFD);
    assert_eq!(cpu.status, Status::INTERRUPT_DISABLE | Status::UNUSED);
    assert_eq!(cpu.cycles, 7);
}

#[test]
fn lda_immediate_loads_value() {
    let mut cpu = boot(&[0xA9, 0x42]); // LDA #$42
    assert_eq!(cpu.step().unwrap(), 2);
    assert_eq!(cpu.a, 0x42);
    assert_eq!(cpu.pc, 0x8002);
    assert!(!cpu.status.contains(Status::ZERO));
}

#[test]
fn lda_sets_zero_and_negative_flags() {
    let mut cpu = boot(&[0xA9, 0x00, 0xA9, 0x80]);
    cpu.step().unwrap();
    assert!(cpu.status.contains(Status::ZERO));
    cpu.step().unwrap();
    assert!(cpu.status.contains(Status::NEGATIVE));
    assert!(!cpu.status.contains(Status::ZERO));
}

#[test]
fn adc_wraps_with_carry_and_zero() {
    let mut cpu = boot(&[0xA9, 0x81, 0x69, 0x7F]); // LDA #$81; ADC #$7F
    run(&mut cpu, 2);
    assert_eq!(cpu.a, 0x00);
    assert!(cpu.status.contains(Status::CARRY));
    assert!(cpu.status.contains(Status::ZERO));
    assert!(!cpu.status.contains(Status::OVERFLOW));
}

#[test]
fn adc_two_positives_overflow() {
    let mut cpu = boot(&[0xA9, 0x7F, 0x69, 0x7F]); // LDA #$7F; ADC #$7F
    run(&mut cpu, 2);
    assert_eq!(cpu.a, 0xFE);
    assert!(cpu.status.contains(Status::OVERFLOW));
    assert!(cpu.status.contains(Status::NEGATIVE));
    assert!(!cpu.status.contains(Status::CARRY));
}

#[test]
fn sbc_borrows() {
    let mut cpu = boot(&[0x38, 0xA9, 0x50, 0xE9, 0xF0]); // SEC; LDA #$50; SBC #$F0
    run(&mut cpu, 3);
    assert_eq!(cpu.a, 0x60);
    assert!(!cpu.status.contains(Status::CARRY));
    assert!(!cpu.status.contains(Status::OVERFLOW));
}

#[test]
fn asl_accumulator_shifts_into_carry() {
    let mut cpu = boot(&[0xA9, 0xFF, 0x0A]); // LDA #$FF; ASL A
    run(&mut cpu, 2);
    assert_eq!(cpu.a, 0xFE);
    assert!(cpu.status.contains(Status::CARRY));
    assert!(cpu.status.contains(Status::NEGATIVE));
}

#[test]
fn ror_rotates_carry_in() {
    let mut cpu = boot(&[0x38, 0xA9, 0x02, 0x6A]); // SEC; LDA #$02; ROR A
    run(&mut cpu, 3);
    assert_eq!(cpu.a, 0x81);
    assert!(!cpu.status.contains(Status::CARRY));
    assert!(cpu.status.contains(Status::NEGATIVE));
}

#[test]
fn inc_memory() {
    let mut cpu = boot_at(0x8000, &[0xEE, 0x00, 0x02], |bus| bus.mem[0x0200] = 0xFF); // INC $0200
    assert_eq!(cpu.step().unwrap(), 6);
    assert_eq!(cpu.bus.mem[0x0200], 0x00);
    assert!(cpu.status.contains(Status::ZERO));
}

#[test]
fn bit_copies_high_bits() {
    let mut cpu = boot_at(0x8000, &[0xA9, 0x01, 0x24, 0x10], |bus| bus.mem[0x10] = 0xC0);
    run(&mut cpu, 2);
    assert!(cpu.status.contains(Status::ZERO));
    assert!(cpu.status.contains(Status::OVERFLOW));
    assert!(cpu.status.contains(Status::NEGATIVE));
}

#[test]
fn cmp_sets_carry_when_greater_or_equal() {
    let mut cpu = boot(&[0xA9, 0x40, 0xC9, 0x40, 0xC9, 0x41]);
    run(&mut cpu, 2);
    assert!(cpu.status.contains(Status::CARRY | Status::ZERO));
    cpu.step().unwrap();
    assert!(!cpu.status.contains(Status::CARRY));
    assert!(cpu.status.contains(Status::NEGATIVE));
}

#[test]
fn sta_writes_to_memory() {
    let mut cpu = boot(&[0xA9, 0x33, 0x8D, 0x00, 0x02]); // LDA #$33; STA $0200
    run(&mut cpu, 2);
    assert_eq!(cpu.bus.mem[0x0200], 0x33);
}

#[test]
fn jmp_absolute() {
    let mut cpu = boot(&[0x4C, 0x0A, 0x80]); // JMP $800A
    cpu.step().unwrap();
    assert_eq!(cpu.pc, 0x800A);
}

#[test]
fn jmp_indirect() {
    let mut cpu = boot_at(0x8000, &[0x6C, 0x00, 0x02], |bus| {
        bus.mem[0x0200] = 0x0A;
        bus.mem[0x0201] = 0x80;
    });
    assert_eq!(cpu.step().unwrap(), 5);
    assert_eq!(cpu.pc, 0x800A);
}

#[test]
fn jmp_indirect_wraps_within_page() {
    let mut cpu = boot_at(0x8000, &[0x6C, 0xFF, 0x02], |bus| {
        bus.mem[0x02FF] = 0x34;
        bus.mem[0x0200] = 0x12;
        bus.mem[0x0300] = 0x56;
    });
    cpu.step().unwrap();
    assert_eq!(cpu.pc, 0x1234);
}

#[test]
fn jsr_and_rts_work() {
    let mut cpu = boot_at(0x8000, &[0x20, 0x00, 0x90, 0xA9, 0x11], |bus| {
        bus.mem[0x9000] = 0xA9; // LDA #$22
        bus.mem[0x9001] = 0x22;
        bus.mem[0x9002] = 0x60; // RTS
    });

    cpu.step().unwrap(); // JSR
    assert_eq!(cpu.bus.mem[0x01FD], 0x80);
    assert_eq!(cpu.bus.mem[0x01FC], 0x02);

    run(&mut cpu, 3); // LDA #$22, RTS, LDA #$11
    assert_eq!(cpu.a, 0x11);
    assert_eq!(cpu.sp, 0xFD);
}

#[test]
fn pha_pla_round_trip() {
    let mut cpu = boot(&[0xA9, 0x42, 0x48, 0xA9, 0x00, 0x68]); // LDA; PHA; LDA #0; PLA
    run(&mut cpu, 4);
    assert_eq!(cpu.a, 0x42);
    assert_eq!(cpu.sp, 0xFD);
    assert!(!cpu.status.contains(Status::ZERO));
}

#[test]
fn php_plp_round_trip_ignores_break_and_unused() {
    let mut cpu = boot(&[0x38, 0xF8, 0x08, 0x18, 0xD8, 0x28]); // SEC SED PHP CLC CLD PLP
    run(&mut cpu, 3);
    assert_eq!(cpu.bus.mem[0x01FD], 0x3D);

    run(&mut cpu, 3);
    assert_eq!(
        cpu.status,
        Status::CARRY | Status::DECIMAL | Status::INTERRUPT_DISABLE | Status::UNUSED
    );
}

#[test]
fn bne_loops_until_zero() {
    let mut cpu = boot(&[0xA2, 0x03, 0xCA, 0xD0, 0xFD]); // LDX #3; DEX; BNE -3
    run(&mut cpu, 7);
    assert_eq!(cpu.x, 0x00);
    assert_eq!(cpu.pc, 0x8005);
}

#[test]
fn branch_cycle_penalties() {
    // Not taken.
    let mut cpu = boot(&[0xA2, 0x00, 0xD0, 0x02]);
    cpu.step().unwrap();
    assert_eq!(cpu.step().unwrap(), 2);

    // Taken, same page.
    let mut cpu = boot(&[0xA2, 0x01, 0xD0, 0x02]);
    cpu.step().unwrap();
    assert_eq!(cpu.step().unwrap(), 3);
    assert_eq!(cpu.pc, 0x8006);

    // Taken, crossing into the next page.
    let mut cpu = boot_at(0x80F0, &[0xD0, 0x10], |_| {});
    assert_eq!(cpu.step().unwrap(), 4);
    assert_eq!(cpu.pc, 0x8102);
}

#[test]
fn indexed_read_page_cross_costs_a_cycle() {
    let mut cpu = boot(&[0xA2, 0x01, 0xBD, 0x00, 0x80, 0xBD, 0xFF, 0x80]);
    cpu.step().unwrap();
    assert_eq!(cpu.step().unwrap(), 4); // LDA $8000,X
    assert_eq!(cpu.step().unwrap(), 5); // LDA $80FF,X
}

#[test]
fn indexed_store_has_fixed_cost() {
    let mut cpu = boot(&[0xA2, 0x01, 0x9D, 0xFF, 0x02]); // STA $02FF,X
    cpu.step().unwrap();
    assert_eq!(cpu.step().unwrap(), 5);
    assert_eq!(cpu.bus.mem[0x0300], 0x00);
}

#[test]
fn brk_and_rti() {
    let mut cpu = boot_at(0x8000, &[0x58, 0x00, 0xFF, 0xEA], |bus| {
        bus.mem[0xFFFE] = 0x00;
        bus.mem[0xFFFF] = 0x90;
        bus.mem[0x9000] = 0x40; // RTI
    });

    cpu.step().unwrap(); // CLI
    assert_eq!(cpu.step().unwrap(), 7);
    assert_eq!(cpu.pc, 0x9000);
    assert_eq!(cpu.bus.mem[0x01FD], 0x80);
    assert_eq!(cpu.bus.mem[0x01FC], 0x03);
    assert_eq!(cpu.bus.mem[0x01FB], 0x30);
    assert!(cpu.status.contains(Status::INTERRUPT_DISABLE));

    cpu.step().unwrap(); // RTI
    assert_eq!(cpu.pc, 0x8003);
    assert!(!cpu.status.contains(Status::INTERRUPT_DISABLE));
    assert_eq!(cpu.sp, 0xFD);
}

#[test]
fn irq_is_masked_by_interrupt_disable() {
    let mut cpu = boot_at(0x8000, &[0x58], |bus| {
        bus.mem[0xFFFE] = 0x00;
        bus.mem[0xFFFF] = 0xA0;
    });

    assert_eq!(cpu.interrupt(Interrupt::Irq), 0);
    assert_eq!(cpu.pc, 0x8000);

    cpu.step().unwrap(); // CLI
    assert_eq!(cpu.interrupt(Interrupt::Irq), 7);
    assert_eq!(cpu.pc, 0xA000);
    assert_eq!(cpu.bus.mem[0x01FB], 0x20);
    assert!(cpu.status.contains(Status::INTERRUPT_DISABLE));
}

#[test]
fn nmi_ignores_interrupt_disable() {
    let mut cpu = boot_at(0x8000, &[], |bus| {
        bus.mem[0xFFFA] = 0x34;
        bus.mem[0xFFFB] = 0x92;
    });
    let before = cpu.cycles;

    assert_eq!(cpu.interrupt(Interrupt::Nmi), 7);
    assert_eq!(cpu.pc, 0x9234);
    assert_eq!(cpu.sp, 0xFA);
    assert_eq!(cpu.cycles, before + 7);
}

#[test]
fn jam_halts_the_cpu() {
    let mut cpu = boot(&[0xEA, 0x02]);
    cpu.step().unwrap();

    let err = cpu.step().unwrap_err();
    assert!(matches!(err, NesError::Jam { opcode: 0x02, addr: 0x8001 }));
    assert!(cpu.halted);
    assert_eq!(cpu.pc, 0x8001);
    assert!(cpu.step().is_err());

    cpu.reset();
    assert!(!cpu.halted);
}

#[test]
fn lax_loads_a_and_x() {
    let mut cpu = boot_at(0x8000, &[0xA7, 0x10], |bus| bus.mem[0x10] = 0x85);
    cpu.step().unwrap();
    assert_eq!((cpu.a, cpu.x), (0x85, 0x85));
    assert!(cpu.status.contains(Status::NEGATIVE));
}

#[test]
fn sax_stores_a_and_x() {
    let mut cpu = boot(&[0xA9, 0xF0, 0xA2, 0x3C, 0x87, 0x20]);
    run(&mut cpu, 3);
    assert_eq!(cpu.bus.mem[0x20], 0x30);
}

#[test]
fn dcp_decrements_then_compares() {
    let mut cpu = boot_at(0x8000, &[0xA9, 0x42, 0xC7, 0x10], |bus| bus.mem[0x10] = 0x43);
    run(&mut cpu, 2);
    assert_eq!(cpu.bus.mem[0x10], 0x42);
    assert!(cpu.status.contains(Status::ZERO | Status::CARRY));
}

#[test]
fn isc_increments_then_subtracts() {
    let mut cpu = boot_at(0x8000, &[0x38, 0xA9, 0x10, 0xE7, 0x10], |bus| bus.mem[0x10] = 0x04);
    run(&mut cpu, 3);
    assert_eq!(cpu.bus.mem[0x10], 0x05);
    assert_eq!(cpu.a, 0x0B);
    assert!(cpu.status.contains(Status::CARRY));
}

#[test]
fn slo_shifts_then_ors() {
    let mut cpu = boot_at(0x8000, &[0xA9, 0x01, 0x07, 0x10], |bus| bus.mem[0x10] = 0x81);
    run(&mut cpu, 2);
    assert_eq!(cpu.bus.mem[0x10], 0x02);
    assert_eq!(cpu.a, 0x03);
    assert!(cpu.status.contains(Status::CARRY));
}

#[test]
fn anc_copies_negative_into_carry() {
    let mut cpu = boot(&[0xA9, 0xFF, 0x0B, 0x80]);
    run(&mut cpu, 2);
    assert_eq!(cpu.a, 0x80);
    assert!(cpu.status.contains(Status::CARRY | Status::NEGATIVE));
}

#[test]
fn alr_ands_then_shifts() {
    let mut cpu = boot(&[0xA9, 0xFF, 0x4B, 0x03]);
    run(&mut cpu, 2);
    assert_eq!(cpu.a, 0x01);
    assert!(cpu.status.contains(Status::CARRY));
}

#[test]
fn arr_sets_carry_and_overflow_from_result() {
    let mut cpu = boot(&[0x38, 0xA9, 0xFF, 0x6B, 0xC0]);
    run(&mut cpu, 3);
    assert_eq!(cpu.a, 0xE0);
    assert!(cpu.status.contains(Status::CARRY | Status::NEGATIVE));
    assert!(!cpu.status.contains(Status::OVERFLOW));
}

#[test]
fn axs_subtracts_from_a_and_x() {
    let mut cpu = boot(&[0xA9, 0xF0, 0xA2, 0x3C, 0xCB, 0x10]);
    run(&mut cpu, 3);
    assert_eq!(cpu.x, 0x20);
    assert!(cpu.status.contains(Status::CARRY));
}

#[test]
fn las_ands_memory_with_stack_pointer() {
    let mut cpu = boot_at(0x8000, &[0xA0, 0x00, 0xBB, 0x00, 0x03], |bus| bus.mem[0x0300] = 0xF0);
    run(&mut cpu, 2);
    assert_eq!((cpu.a, cpu.x, cpu.sp), (0xF0, 0xF0, 0xF0));
}

#[test]
fn shx_masks_with_high_byte() {
    let mut cpu = boot(&[0xA2, 0xFF, 0xA0, 0x00, 0x9E, 0x00, 0x02]); // SHX $0200,Y
    run(&mut cpu, 3);
    assert_eq!(cpu.bus.mem[0x0200], 0x03);
}

#[test]
fn shx_page_cross_corrupts_target_high_byte() {
    let mut cpu = boot(&[0xA2, 0x05, 0xA0, 0x01, 0x9E, 0xFF, 0x02]); // SHX $02FF,Y
    run(&mut cpu, 3);
    assert_eq!(cpu.bus.mem[0x0100], 0x01);
    assert_eq!(cpu.bus.mem[0x0300], 0x00);
}

#[test]
fn undocumented_nops_skip_operands() {
    let mut cpu = boot(&[0xA2, 0x01, 0x80, 0x55, 0x1C, 0xFF, 0x80, 0xEA]);
    cpu.step().unwrap();
    assert_eq!(cpu.step().unwrap(), 2); // NOP #$55
    assert_eq!(cpu.pc, 0x8004);
    assert_eq!(cpu.step().unwrap(), 5); // NOP $80FF,X
    assert_eq!(cpu.pc, 0x8007);
}
