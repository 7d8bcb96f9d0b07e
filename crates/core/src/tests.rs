#[cfg(test)]
mod tests {
    use crate::bus::SystemBus;
    use crate::metrics::AccessMetrics;
    use crate::peripherals::gpio::GpioPort;
    use crate::peripherals::rcc::Rcc;
    use crate::{Bus, HaltReason, Machine, MachineState, SimulationError};
    use l4blink_hal::startup::SegmentLayout;
    use l4blink_hal::vectors::Exception;
    use l4blink_hal::{gpio, Peripherals, RegisterBus};
    use std::sync::Arc;

    const RCC_AHB2ENR: u64 = 0x4002_104C;
    const GPIOA_MODER: u64 = 0x4800_0000;
    const GPIOA_ODR: u64 = 0x4800_0014;

    const EMPTY_LAYOUT: SegmentLayout = SegmentLayout {
        data_load: 0x0800_0000,
        data_start: 0x2000_0000,
        data_end: 0x2000_0000,
        bss_start: 0x2000_0000,
        bss_end: 0x2000_0000,
    };

    #[test]
    fn test_default_memory_map() {
        let bus = SystemBus::new();
        assert_eq!(bus.flash.base_addr, 0x0800_0000);
        assert_eq!(bus.flash.data.len(), 1024 * 1024);
        assert_eq!(bus.ram.base_addr, 0x2000_0000);
        assert_eq!(bus.ram.data.len(), 96 * 1024);

        let names: Vec<_> = bus.peripherals.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            names,
            ["rcc", "gpioa", "gpiob", "gpioc", "gpiod", "gpioe", "gpiof", "gpiog", "gpioh"]
        );
    }

    #[test]
    fn test_flash_is_read_only() {
        let mut bus = SystemBus::new();
        assert_eq!(
            bus.write_u32(0x0800_0100, 1),
            Err(SimulationError::FlashWrite(0x0800_0100))
        );
        assert_eq!(
            bus.write_u8(0x0800_0100, 1),
            Err(SimulationError::FlashWrite(0x0800_0100))
        );
    }

    #[test]
    fn test_unmapped_access_faults() {
        let mut bus = SystemBus::new();
        assert_eq!(
            bus.read_u32(0x6000_0000),
            Err(SimulationError::MemoryViolation(0x6000_0000))
        );
        assert_eq!(
            bus.write_u32(0x2001_8000, 0),
            Err(SimulationError::MemoryViolation(0x2001_8000))
        );
        // Unaligned word access to a register block
        assert_eq!(
            bus.write_u32(GPIOA_MODER + 2, 0),
            Err(SimulationError::MemoryViolation(GPIOA_MODER + 2))
        );
    }

    #[test]
    fn test_clock_gate() {
        let mut bus = SystemBus::new();

        // Gated: reads as zero, writes are dropped
        assert_eq!(bus.read_u32(GPIOA_MODER).unwrap(), 0);
        bus.write_u32(GPIOA_ODR, 0x20).unwrap();

        bus.write_u32(RCC_AHB2ENR, 0x1).unwrap();
        assert_eq!(bus.read_u32(GPIOA_MODER).unwrap(), 0xABFF_FFFF);
        assert_eq!(bus.read_u32(GPIOA_ODR).unwrap(), 0);

        bus.write_u32(GPIOA_ODR, 0x20).unwrap();
        assert_eq!(bus.peripheral::<GpioPort>("gpioa").unwrap().odr(), 0x20);

        // GPIOB stays gated
        bus.write_u32(0x4800_0414, 0x1).unwrap();
        assert_eq!(bus.peripheral::<GpioPort>("gpiob").unwrap().odr(), 0);
    }

    #[test]
    fn test_peripheral_downcast() {
        let mut bus = SystemBus::new();
        assert!(bus.peripheral::<Rcc>("rcc").is_some());
        assert!(bus.peripheral::<GpioPort>("rcc").is_none());
        assert!(bus.peripheral::<GpioPort>("gpioz").is_none());

        bus.peripheral_mut::<GpioPort>("gpioc").unwrap().set_input(13, true);
        bus.write_u32(RCC_AHB2ENR, 0x4).unwrap();
        assert_eq!(bus.read_u32(0x4800_0810).unwrap(), 1 << 13);
    }

    #[test]
    fn test_boot_halts_when_entry_returns() {
        let mut machine = Machine::new();
        assert_eq!(machine.state(), MachineState::Reset);

        let mut ran = false;
        let reason = machine.boot(EMPTY_LAYOUT, |m| {
            assert_eq!(m.state(), MachineState::Running);
            ran = true;
        });

        assert!(ran);
        assert_eq!(reason, HaltReason::EntryReturned);
        assert_eq!(
            machine.state(),
            MachineState::Halted(HaltReason::EntryReturned)
        );
    }

    #[test]
    fn test_configure_output_pin_on_machine() {
        let mut machine = Machine::new();
        let mut p = unsafe { Peripherals::steal() };

        machine.boot(EMPTY_LAYOUT, |m| {
            gpio::configure_output_pin(m, &mut p.rcc, &mut p.gpioa, 5);
        });

        let rcc = machine.bus.peripheral::<Rcc>("rcc").unwrap();
        assert_eq!(rcc.ahb2enr() & 0x1, 0x1);
        let gpioa = machine.bus.peripheral::<GpioPort>("gpioa").unwrap();
        assert_eq!(gpioa.pin_mode(5), 0b01);
        // PA13/PA14 keep their debug alternate function
        assert_eq!(gpioa.pin_mode(13), 0b10);
        assert_eq!(gpioa.pin_mode(14), 0b10);
    }

    #[test]
    fn test_claimed_exception_does_not_halt() {
        let mut machine = Machine::new();
        machine.claim_exception(Exception::SysTick);

        machine.inject_exception(15).unwrap();
        assert_eq!(machine.state(), MachineState::Reset);

        machine.inject_exception(14).unwrap();
        assert_eq!(
            machine.state(),
            MachineState::Halted(HaltReason::UnexpectedException(14))
        );
        assert_eq!(
            machine.inject_exception(15),
            Err(SimulationError::Halted(HaltReason::UnexpectedException(14)))
        );
    }

    #[test]
    fn test_reserved_vector_escalates_to_hard_fault() {
        let mut machine = Machine::new();
        machine.inject_exception(7).unwrap();
        assert_eq!(machine.halt_reason(), Some(HaltReason::UnexpectedException(3)));
    }

    #[test]
    fn test_startup_fault_skips_entry() {
        let mut machine = Machine::new();
        machine.bus.ram.fill(0xA5);
        let layout = SegmentLayout {
            data_load: 0x6000_0000,
            data_start: 0x2000_0000,
            data_end: 0x2000_0010,
            bss_start: 0x2000_0010,
            bss_end: 0x2000_0020,
        };

        let mut entered = false;
        let reason = machine.boot(layout, |_| entered = true);

        assert!(!entered);
        assert_eq!(reason, HaltReason::UnexpectedException(5));
        assert_eq!(
            machine.last_fault(),
            Some(&SimulationError::MemoryViolation(0x6000_0000))
        );
        // Neither the copy nor the zero-fill reached RAM
        assert_eq!(machine.bus.ram.read_u32(0x2000_0000), Some(0xA5A5_A5A5));
        assert_eq!(machine.bus.ram.read_u32(0x2000_0010), Some(0xA5A5_A5A5));
    }

    #[test]
    fn test_load_address_at_top_of_memory_faults() {
        let mut machine = Machine::new();
        let layout = SegmentLayout {
            data_load: 0xFFFF_FFF8,
            data_start: 0x2000_0000,
            data_end: 0x2000_0010,
            bss_start: 0x2000_0010,
            bss_end: 0x2000_0010,
        };

        let mut entered = false;
        let reason = machine.boot(layout, |_| entered = true);

        assert!(!entered);
        assert_eq!(reason, HaltReason::UnexpectedException(5));
        assert_eq!(
            machine.state(),
            MachineState::Halted(HaltReason::UnexpectedException(5))
        );
    }

    #[test]
    fn test_gpiob_debug_pin_reset_values() {
        let mut bus = SystemBus::new();
        bus.write_u32(RCC_AHB2ENR, 0x2).unwrap();
        assert_eq!(bus.read_u32(0x4800_0400).unwrap(), 0xFFFF_FEBF);
        // PB3 (SWO) comes up at very high speed
        assert_eq!(bus.read_u32(0x4800_0408).unwrap(), 0x0000_00C0);
        assert_eq!(bus.read_u32(0x4800_040C).unwrap(), 0x0000_0100);
    }

    #[test]
    fn test_bus_fault_halts() {
        let mut machine = Machine::new();
        let reason = machine.boot(EMPTY_LAYOUT, |m| {
            m.write_u32(0x0800_0000, 0xFFFF_FFFF);
            // Never reaches RAM
            m.write_u32(0x2000_0000, 0x1234_5678);
        });

        assert_eq!(reason, HaltReason::UnexpectedException(5));
        assert_eq!(
            machine.last_fault(),
            Some(&SimulationError::FlashWrite(0x0800_0000))
        );
        assert_eq!(machine.bus.ram.read_u32(0x2000_0000), Some(0));
    }

    #[test]
    fn test_reset_clears_halt_and_peripherals() {
        let mut machine = Machine::new();
        machine.boot(EMPTY_LAYOUT, |m| {
            m.write_u32(RCC_AHB2ENR as u32, 0xFF);
            m.write_u32(0x2000_0010, 0xCAFE);
        });
        assert!(machine.is_halted());

        machine.reset();
        assert_eq!(machine.state(), MachineState::Reset);
        assert_eq!(machine.bus.peripheral::<Rcc>("rcc").unwrap().ahb2enr(), 0);
        // SRAM survives a reset
        assert_eq!(machine.bus.ram.read_u32(0x2000_0010), Some(0xCAFE));
    }

    #[test]
    fn test_metrics_observer() {
        let metrics = Arc::new(AccessMetrics::new());
        let mut machine = Machine::new();
        machine.add_observer(metrics.clone());

        machine.boot(EMPTY_LAYOUT, |m| {
            let v = m.read_u32(0x2000_0000);
            m.write_u32(0x2000_0000, v + 1);
        });
        machine.write_u32(0x2000_0000, 7);

        assert_eq!(metrics.get_resets(), 1);
        assert_eq!(metrics.get_reads(), 1);
        assert_eq!(metrics.get_writes(), 1);
        assert_eq!(metrics.get_rejected_writes(), 1);
        assert_eq!(metrics.get_halts(), 1);

        metrics.reset();
        assert_eq!(metrics.get_writes(), 0);
    }

    #[test]
    fn test_vectors_from_image() {
        let mut machine = Machine::new();
        let mut image = crate::memory::ProgramImage::new();
        image.add_words(0x0800_0000, &[0x2001_8000, 0x0800_0199, 0x0800_0201]);
        machine.load_firmware(&image);

        assert_eq!(machine.initial_vectors().unwrap(), (0x2001_8000, 0x0800_0199));
        assert_eq!(machine.vector(2).unwrap(), 0x0800_0201);
    }

    #[test]
    fn test_from_config_rejects_overflowing_gate() {
        use l4blink_config::{Arch, ChipDescriptor, ClockGate, MemoryRange, PeripheralConfig};

        let peripheral = |id: &str, r#type: &str, base_address: u64| PeripheralConfig {
            id: id.to_string(),
            r#type: r#type.to_string(),
            base_address,
            size: None,
            clock_gate: None,
            config: Default::default(),
        };
        let mut gpioa = peripheral("gpioa", "gpio", 0x4800_0000);
        gpioa.clock_gate = Some(ClockGate {
            controller: "rcc".to_string(),
            register: u64::MAX,
            bit: 0,
        });
        let chip = ChipDescriptor {
            name: "broken".to_string(),
            arch: Arch::Arm,
            flash: MemoryRange {
                base: 0x0800_0000,
                size: "1MiB".to_string(),
            },
            ram: MemoryRange {
                base: 0x2000_0000,
                size: "96KiB".to_string(),
            },
            peripherals: vec![peripheral("rcc", "rcc", 0x4002_1000), gpioa],
        };

        let err = Machine::from_config(&chip).err().unwrap();
        assert!(err.to_string().contains("'gpioa' overflows"));
    }

    #[test]
    fn test_snapshot() {
        let mut machine = Machine::new();
        machine.inject_exception(3).unwrap();

        let snapshot = machine.snapshot();
        assert_eq!(snapshot.state, "Halted(UnexpectedException(3))");
        assert!(snapshot.last_fault.is_none());
        assert_eq!(snapshot.peripherals.len(), 9);
        assert_eq!(snapshot.peripherals["gpioa"]["moder"], 0xABFF_FFFFu32);

        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("gpioh"));
    }
}
