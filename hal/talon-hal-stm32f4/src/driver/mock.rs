//! Simulated vendor driver for host-side testing
//!
//! `MockDriver` keeps the observable peripheral state in memory and records
//! every configuration call in order, so tests can assert both the end
//! state and the sequence that produced it.
//!
//! Available during test builds and with the `mock` feature.

#![cfg(any(test, feature = "mock"))]

use core::cell::RefCell;

use heapless::{Deque, Vec};

use super::{Bus, ClockGate, GpioDriver, I2cDriver, Irq, SpiDriver, SystemDriver, UartDriver};
use crate::clock::ClockConfig;
use crate::error::Status;
use crate::gpio::Port;
use crate::handle::{GpioInit, I2cHandle, RegisterBlock, SpiHandle, UartHandle};
use crate::regs;

/// Number of calls retained in the log; later calls are dropped
pub const CALL_LOG_CAPACITY: usize = 128;

const BUFFER_CAPACITY: usize = 64;
const PORT_COUNT: usize = Port::ALL.len();

/// Clock reported before the tree is configured (internal RC oscillator)
const HSI_HZ: u32 = 16_000_000;

/// A recorded driver call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Init,
    Deinit,
    SetupClocks(ClockConfig),
    EnableClock(ClockGate),
    SetPriority(Irq, u32, u32),
    EnableIrq(Irq),
    DisableIrq(Irq),
    GpioInit(RegisterBlock, GpioInit),
    GpioDeinit(RegisterBlock, u16),
    ExtiCheck(u16),
    SpiInit(SpiHandle),
    SpiTransmit(RegisterBlock, usize, u32),
    SpiReceive(RegisterBlock, usize, u32),
    SpiTransmitReceive(RegisterBlock, usize, u32),
    I2cInit(I2cHandle),
    I2cTransmit(u16, usize),
    I2cReceive(u16, usize),
    I2cMemRead(u16, u16, usize),
    I2cMemWrite(u16, u16, usize),
    I2cModifyControl(RegisterBlock, u32, u32),
    UartInit(UartHandle),
    UartTransmit(usize, u32),
    UartReceive(usize, u32),
}

struct State {
    clocks_config: Option<ClockConfig>,
    system_status: Status,
    status: Status,
    version: u32,
    tick: u32,
    levels: [u16; PORT_COUNT],
    held_low: [u16; PORT_COUNT],
    stuck_slave: Option<StuckSlave>,
    exti_pending: u16,
    clocks: Vec<ClockGate, 24>,
    priorities: Vec<(Irq, u32, u32), 16>,
    enabled_irqs: Vec<Irq, 16>,
    spi_busy_polls: u32,
    spi_rx: Deque<u8, BUFFER_CAPACITY>,
    spi_tx: Vec<u8, BUFFER_CAPACITY>,
    i2c_control: [u32; 2],
    i2c_registers: [u8; 256],
    i2c_rx: Deque<u8, BUFFER_CAPACITY>,
    i2c_tx: Vec<u8, BUFFER_CAPACITY>,
    uart_rx: Deque<u8, BUFFER_CAPACITY>,
    uart_tx: Vec<u8, BUFFER_CAPACITY>,
    calls: Vec<Call, CALL_LOG_CAPACITY>,
}

impl State {
    fn new() -> Self {
        Self {
            clocks_config: None,
            system_status: Status::OK,
            status: Status::OK,
            version: 0x0108_0000,
            tick: 0,
            levels: [0; PORT_COUNT],
            held_low: [0; PORT_COUNT],
            stuck_slave: None,
            exti_pending: 0,
            clocks: Vec::new(),
            priorities: Vec::new(),
            enabled_irqs: Vec::new(),
            spi_busy_polls: 0,
            spi_rx: Deque::new(),
            spi_tx: Vec::new(),
            i2c_control: [0; 2],
            i2c_registers: [0; 256],
            i2c_rx: Deque::new(),
            i2c_tx: Vec::new(),
            uart_rx: Deque::new(),
            uart_tx: Vec::new(),
            calls: Vec::new(),
        }
    }

    fn record(&mut self, call: Call) {
        let _ = self.calls.push(call);
    }

    fn drive(&mut self, port: usize, mask: u16, levels: u16) {
        let rising = !self.levels[port] & levels & mask;
        self.levels[port] = (self.levels[port] & !mask) | (levels & mask);

        let Some(slave) = self.stuck_slave.as_mut() else {
            return;
        };
        if slave.port == port && rising & slave.clock != 0 {
            slave.edges_left = slave.edges_left.saturating_sub(1);
            if slave.edges_left == 0 {
                self.held_low[port] &= !slave.data;
                self.stuck_slave = None;
            }
        }
    }
}

/// A slave holding a data line low until it has seen enough clock edges
struct StuckSlave {
    port: usize,
    data: u16,
    clock: u16,
    edges_left: u32,
}

fn port_index(port: RegisterBlock) -> usize {
    (port.address() - regs::AHB1PERIPH_BASE) / regs::GPIO_PORT_STRIDE
}

fn i2c_index(instance: RegisterBlock) -> usize {
    if instance == RegisterBlock::I2C1 {
        0
    } else {
        1
    }
}

/// In-memory vendor driver
///
/// # Example
///
/// Outside this crate's own tests the driver needs the `mock` feature.
///
/// ```ignore
/// use talon_hal_stm32f4::driver::mock::MockDriver;
/// use talon_hal_stm32f4::driver::GpioDriver;
/// use talon_hal_stm32f4::gpio::Port;
///
/// let driver = MockDriver::new();
/// driver.gpio_write(Port::B.base(), 1 << 13, true);
/// assert!(driver.level(Port::B, 13));
/// ```
pub struct MockDriver {
    state: RefCell<State>,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDriver {
    pub fn new() -> Self {
        Self {
            state: RefCell::new(State::new()),
        }
    }

    /// Calls recorded so far, oldest first
    pub fn calls(&self) -> Vec<Call, CALL_LOG_CAPACITY> {
        self.state.borrow().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    /// Status returned by controller routines (init and transfers)
    pub fn set_status(&self, status: Status) {
        self.state.borrow_mut().status = status;
    }

    /// Status returned by system init, deinit and clock setup
    pub fn set_system_status(&self, status: Status) {
        self.state.borrow_mut().system_status = status;
    }

    pub fn set_version(&self, version: u32) {
        self.state.borrow_mut().version = version;
    }

    /// Current level of a pin as seen on its input register
    pub fn level(&self, port: Port, number: u8) -> bool {
        self.gpio_read(port.base(), 1 << number)
    }

    /// Drive an input pin from outside
    pub fn set_level(&self, port: Port, number: u8, high: bool) {
        let mut state = self.state.borrow_mut();
        let levels = &mut state.levels[port as usize];
        if high {
            *levels |= 1 << number;
        } else {
            *levels &= !(1 << number);
        }
    }

    /// Hold a line low regardless of what the pin drives, like a stuck bus
    pub fn hold_low(&self, port: Port, number: u8, held: bool) {
        let mut state = self.state.borrow_mut();
        let held_low = &mut state.held_low[port as usize];
        if held {
            *held_low |= 1 << number;
        } else {
            *held_low &= !(1 << number);
        }
    }

    /// Hold `data` low until `edges` rising edges are driven on `clock`
    ///
    /// Models a slave that was interrupted mid-byte and keeps SDA low until
    /// the master clocks out the rest of it.
    pub fn stick_until_clocked(&self, port: Port, data: u8, clock: u8, edges: u32) {
        let mut state = self.state.borrow_mut();
        let index = port as usize;
        state.held_low[index] |= 1 << data;
        state.stuck_slave = Some(StuckSlave {
            port: index,
            data: 1 << data,
            clock: 1 << clock,
            edges_left: edges,
        });
    }

    /// Latch EXTI pending flags
    pub fn raise_exti(&self, mask: u16) {
        self.state.borrow_mut().exti_pending |= mask;
    }

    pub fn exti_pending(&self) -> u16 {
        self.state.borrow().exti_pending
    }

    pub fn clock_enabled(&self, gate: ClockGate) -> bool {
        self.state.borrow().clocks.contains(&gate)
    }

    pub fn irq_enabled(&self, irq: Irq) -> bool {
        self.state.borrow().enabled_irqs.contains(&irq)
    }

    /// Last priority set for `irq` as (preempt, sub)
    pub fn priority(&self, irq: Irq) -> Option<(u32, u32)> {
        self.state
            .borrow()
            .priorities
            .iter()
            .rev()
            .find(|(line, _, _)| *line == irq)
            .map(|&(_, preempt, sub)| (preempt, sub))
    }

    /// Number of readiness polls that report busy after each transmit
    pub fn set_spi_busy_polls(&self, polls: u32) {
        self.state.borrow_mut().spi_busy_polls = polls;
    }

    pub fn push_spi_rx(&self, data: &[u8]) {
        let mut state = self.state.borrow_mut();
        for &byte in data {
            let _ = state.spi_rx.push_back(byte);
        }
    }

    pub fn spi_tx(&self) -> Vec<u8, BUFFER_CAPACITY> {
        self.state.borrow().spi_tx.clone()
    }

    pub fn push_i2c_rx(&self, data: &[u8]) {
        let mut state = self.state.borrow_mut();
        for &byte in data {
            let _ = state.i2c_rx.push_back(byte);
        }
    }

    pub fn i2c_tx(&self) -> Vec<u8, BUFFER_CAPACITY> {
        self.state.borrow().i2c_tx.clone()
    }

    /// Simulated CR1 register of an I2C controller
    pub fn i2c_control(&self, instance: RegisterBlock) -> u32 {
        self.state.borrow().i2c_control[i2c_index(instance)]
    }

    /// Register file of the simulated I2C device
    pub fn i2c_register(&self, register: u8) -> u8 {
        self.state.borrow().i2c_registers[register as usize]
    }

    pub fn set_i2c_register(&self, register: u8, value: u8) {
        self.state.borrow_mut().i2c_registers[register as usize] = value;
    }

    pub fn push_uart_rx(&self, data: &[u8]) {
        let mut state = self.state.borrow_mut();
        for &byte in data {
            let _ = state.uart_rx.push_back(byte);
        }
    }

    pub fn uart_tx(&self) -> Vec<u8, BUFFER_CAPACITY> {
        self.state.borrow().uart_tx.clone()
    }
}

impl SystemDriver for MockDriver {
    fn init(&self) -> Status {
        let mut state = self.state.borrow_mut();
        state.record(Call::Init);
        state.system_status
    }

    fn deinit(&self) -> Status {
        let mut state = self.state.borrow_mut();
        state.record(Call::Deinit);
        state.system_status
    }

    fn setup_clocks(&self, config: &ClockConfig) -> Status {
        let mut state = self.state.borrow_mut();
        state.record(Call::SetupClocks(*config));
        if state.system_status == Status::OK {
            state.clocks_config = Some(*config);
        }
        state.system_status
    }

    fn version(&self) -> u32 {
        self.state.borrow().version
    }

    fn sysclk_frequency(&self) -> u32 {
        self.state
            .borrow()
            .clocks_config
            .map_or(HSI_HZ, |config| config.sysclk_hz())
    }

    fn bus_frequency(&self, bus: Bus) -> u32 {
        let config = self.state.borrow().clocks_config;
        match (config, bus) {
            (None, _) => HSI_HZ,
            (Some(config), Bus::Apb1) => config.pclk1_hz(),
            (Some(config), Bus::Apb2) => config.pclk2_hz(),
        }
    }

    fn tick(&self) -> u32 {
        self.state.borrow().tick
    }

    fn increment_tick(&self) {
        let mut state = self.state.borrow_mut();
        state.tick = state.tick.wrapping_add(1);
    }

    fn delay_ms(&self, ms: u32) {
        let mut state = self.state.borrow_mut();
        state.tick = state.tick.wrapping_add(ms);
    }

    fn enable_clock(&self, gate: ClockGate) {
        let mut state = self.state.borrow_mut();
        state.record(Call::EnableClock(gate));
        if !state.clocks.contains(&gate) {
            let _ = state.clocks.push(gate);
        }
    }

    fn set_priority(&self, irq: Irq, preempt: u32, sub: u32) {
        let mut state = self.state.borrow_mut();
        state.record(Call::SetPriority(irq, preempt, sub));
        let _ = state.priorities.push((irq, preempt, sub));
    }

    fn enable_irq(&self, irq: Irq) {
        let mut state = self.state.borrow_mut();
        state.record(Call::EnableIrq(irq));
        if !state.enabled_irqs.contains(&irq) {
            let _ = state.enabled_irqs.push(irq);
        }
    }

    fn disable_irq(&self, irq: Irq) {
        let mut state = self.state.borrow_mut();
        state.record(Call::DisableIrq(irq));
        state.enabled_irqs.retain(|line| *line != irq);
    }
}

impl GpioDriver for MockDriver {
    fn gpio_init(&self, port: RegisterBlock, init: &GpioInit) {
        self.state.borrow_mut().record(Call::GpioInit(port, *init));
    }

    fn gpio_deinit(&self, port: RegisterBlock, mask: u16) {
        let mut state = self.state.borrow_mut();
        state.record(Call::GpioDeinit(port, mask));
        state.levels[port_index(port)] &= !mask;
    }

    fn gpio_read(&self, port: RegisterBlock, mask: u16) -> bool {
        let state = self.state.borrow();
        let index = port_index(port);
        state.levels[index] & !state.held_low[index] & mask != 0
    }

    fn gpio_write(&self, port: RegisterBlock, mask: u16, high: bool) {
        let levels = if high { mask } else { 0 };
        self.state.borrow_mut().drive(port_index(port), mask, levels);
    }

    fn gpio_toggle(&self, port: RegisterBlock, mask: u16) {
        let mut state = self.state.borrow_mut();
        let index = port_index(port);
        let levels = !state.levels[index];
        state.drive(index, mask, levels);
    }

    fn exti_check_and_clear(&self, mask: u16) -> bool {
        let mut state = self.state.borrow_mut();
        state.record(Call::ExtiCheck(mask));
        let pending = state.exti_pending & mask != 0;
        state.exti_pending &= !mask;
        pending
    }
}

impl SpiDriver for MockDriver {
    fn spi_init(&self, handle: &SpiHandle) -> Status {
        let mut state = self.state.borrow_mut();
        state.record(Call::SpiInit(*handle));
        state.status
    }

    fn spi_transmit(&self, handle: &SpiHandle, data: &[u8], timeout_ms: u32) -> Status {
        let mut state = self.state.borrow_mut();
        state.record(Call::SpiTransmit(handle.instance, data.len(), timeout_ms));
        if state.status == Status::OK {
            let _ = state.spi_tx.extend_from_slice(data);
        }
        state.status
    }

    fn spi_receive(&self, handle: &SpiHandle, buf: &mut [u8], timeout_ms: u32) -> Status {
        let mut state = self.state.borrow_mut();
        state.record(Call::SpiReceive(handle.instance, buf.len(), timeout_ms));
        if state.status == Status::OK {
            for byte in buf.iter_mut() {
                *byte = state.spi_rx.pop_front().unwrap_or(0xFF);
            }
        }
        state.status
    }

    fn spi_transmit_receive(
        &self,
        handle: &SpiHandle,
        tx: &[u8],
        rx: &mut [u8],
        timeout_ms: u32,
    ) -> Status {
        let mut state = self.state.borrow_mut();
        state.record(Call::SpiTransmitReceive(handle.instance, tx.len(), timeout_ms));
        if state.status == Status::OK {
            let _ = state.spi_tx.extend_from_slice(tx);
            for byte in rx.iter_mut() {
                *byte = state.spi_rx.pop_front().unwrap_or(0xFF);
            }
        }
        state.status
    }

    fn spi_is_ready(&self, _handle: &SpiHandle) -> bool {
        let mut state = self.state.borrow_mut();
        if state.spi_busy_polls > 0 {
            state.spi_busy_polls -= 1;
            false
        } else {
            true
        }
    }
}

impl I2cDriver for MockDriver {
    fn i2c_init(&self, handle: &I2cHandle) -> Status {
        let mut state = self.state.borrow_mut();
        state.record(Call::I2cInit(*handle));
        if state.status == Status::OK {
            state.i2c_control[i2c_index(handle.instance)] |= regs::I2C_CR1_PE;
        }
        state.status
    }

    fn i2c_master_transmit(
        &self,
        _handle: &I2cHandle,
        address: u16,
        data: &[u8],
        _timeout_ms: u32,
    ) -> Status {
        let mut state = self.state.borrow_mut();
        state.record(Call::I2cTransmit(address, data.len()));
        if state.status == Status::OK {
            let _ = state.i2c_tx.extend_from_slice(data);
        }
        state.status
    }

    fn i2c_master_receive(
        &self,
        _handle: &I2cHandle,
        address: u16,
        buf: &mut [u8],
        _timeout_ms: u32,
    ) -> Status {
        let mut state = self.state.borrow_mut();
        state.record(Call::I2cReceive(address, buf.len()));
        if state.status == Status::OK {
            for byte in buf.iter_mut() {
                *byte = state.i2c_rx.pop_front().unwrap_or(0xFF);
            }
        }
        state.status
    }

    fn i2c_mem_read(
        &self,
        _handle: &I2cHandle,
        address: u16,
        register: u16,
        _register_size: u16,
        buf: &mut [u8],
        _timeout_ms: u32,
    ) -> Status {
        let mut state = self.state.borrow_mut();
        state.record(Call::I2cMemRead(address, register, buf.len()));
        if state.status == Status::OK {
            for (offset, byte) in buf.iter_mut().enumerate() {
                *byte = state.i2c_registers[(register as usize + offset) % 256];
            }
        }
        state.status
    }

    fn i2c_mem_write(
        &self,
        _handle: &I2cHandle,
        address: u16,
        register: u16,
        _register_size: u16,
        data: &[u8],
        _timeout_ms: u32,
    ) -> Status {
        let mut state = self.state.borrow_mut();
        state.record(Call::I2cMemWrite(address, register, data.len()));
        if state.status == Status::OK {
            for (offset, &byte) in data.iter().enumerate() {
                state.i2c_registers[(register as usize + offset) % 256] = byte;
            }
        }
        state.status
    }

    fn i2c_modify_control(&self, instance: RegisterBlock, clear: u32, set: u32) {
        let mut state = self.state.borrow_mut();
        state.record(Call::I2cModifyControl(instance, clear, set));
        let control = &mut state.i2c_control[i2c_index(instance)];
        *control = (*control & !clear) | set;
    }
}

impl UartDriver for MockDriver {
    fn uart_init(&self, handle: &UartHandle) -> Status {
        let mut state = self.state.borrow_mut();
        state.record(Call::UartInit(*handle));
        state.status
    }

    fn uart_transmit(&self, _handle: &UartHandle, data: &[u8], timeout_ms: u32) -> Status {
        let mut state = self.state.borrow_mut();
        state.record(Call::UartTransmit(data.len(), timeout_ms));
        if state.status == Status::OK {
            let _ = state.uart_tx.extend_from_slice(data);
        }
        state.status
    }

    /// Fills `buf` from the receive queue, timing out when it runs dry
    fn uart_receive(&self, _handle: &UartHandle, buf: &mut [u8], timeout_ms: u32) -> Status {
        let mut state = self.state.borrow_mut();
        state.record(Call::UartReceive(buf.len(), timeout_ms));
        if state.status != Status::OK {
            return state.status;
        }
        for byte in buf.iter_mut() {
            match state.uart_rx.pop_front() {
                Some(received) => *byte = received,
                None => return Status::TIMEOUT,
            }
        }
        Status::OK
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frequencies_follow_clock_setup() {
        let driver = MockDriver::new();
        assert_eq!(driver.sysclk_frequency(), HSI_HZ);

        driver.setup_clocks(&ClockConfig::default());
        assert_eq!(driver.sysclk_frequency(), 168_000_000);
        assert_eq!(driver.bus_frequency(Bus::Apb1), 42_000_000);
        assert_eq!(driver.bus_frequency(Bus::Apb2), 84_000_000);
    }

    #[test]
    fn test_held_line_reads_low() {
        let driver = MockDriver::new();
        driver.gpio_write(Port::B.base(), 1 << 6, true);
        assert!(driver.level(Port::B, 6));

        driver.hold_low(Port::B, 6, true);
        assert!(!driver.level(Port::B, 6));
    }

    #[test]
    fn test_stuck_slave_releases_after_clock_edges() {
        let driver = MockDriver::new();
        let scl = Port::B.base();
        driver.gpio_write(Port::B.base(), 1 << 7, true);
        driver.stick_until_clocked(Port::B, 7, 6, 2);
        assert!(!driver.level(Port::B, 7));

        driver.gpio_write(scl, 1 << 6, true);
        driver.gpio_write(scl, 1 << 6, true);
        assert!(!driver.level(Port::B, 7));

        driver.gpio_write(scl, 1 << 6, false);
        driver.gpio_write(scl, 1 << 6, true);
        assert!(driver.level(Port::B, 7));
    }

    #[test]
    fn test_exti_check_clears_only_requested_line() {
        let driver = MockDriver::new();
        driver.raise_exti(0b1010_0000);

        assert!(!driver.exti_check_and_clear(1 << 6));
        assert!(driver.exti_check_and_clear(1 << 7));
        assert_eq!(driver.exti_pending(), 1 << 5);
    }

    #[test]
    fn test_uart_receive_times_out_on_short_queue() {
        let driver = MockDriver::new();
        let handle = UartHandle::bind(RegisterBlock::USART3);
        driver.push_uart_rx(b"a");

        let mut buf = [0u8; 2];
        assert_eq!(driver.uart_receive(&handle, &mut buf, 10), Status::TIMEOUT);
        assert_eq!(buf[0], b'a');
    }
}
