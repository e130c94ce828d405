//! Vendor register constants
//!
//! Discrete values understood by the vendor driver's init records. Values
//! follow the STM32F4 reference manual (RM0090) and the vendor HAL headers.

// Memory map
pub const PERIPH_BASE: usize = 0x4000_0000;
pub const APB1PERIPH_BASE: usize = PERIPH_BASE;
pub const APB2PERIPH_BASE: usize = PERIPH_BASE + 0x0001_0000;
pub const AHB1PERIPH_BASE: usize = PERIPH_BASE + 0x0002_0000;

/// Distance between consecutive GPIO port register blocks
pub const GPIO_PORT_STRIDE: usize = 0x400;

pub const SPI2_BASE: usize = APB1PERIPH_BASE + 0x3800;
pub const SPI3_BASE: usize = APB1PERIPH_BASE + 0x3C00;
pub const USART3_BASE: usize = APB1PERIPH_BASE + 0x4800;
pub const I2C1_BASE: usize = APB1PERIPH_BASE + 0x5400;
pub const I2C2_BASE: usize = APB1PERIPH_BASE + 0x5800;
pub const SPI1_BASE: usize = APB2PERIPH_BASE + 0x3000;

// GPIO modes
pub const GPIO_MODE_INPUT: u32 = 0x0000_0000;
pub const GPIO_MODE_OUTPUT_PP: u32 = 0x0000_0001;
pub const GPIO_MODE_OUTPUT_OD: u32 = 0x0000_0011;
pub const GPIO_MODE_AF_PP: u32 = 0x0000_0002;
pub const GPIO_MODE_AF_OD: u32 = 0x0000_0012;
pub const GPIO_MODE_ANALOG: u32 = 0x0000_0003;
pub const GPIO_MODE_IT_RISING: u32 = 0x1011_0000;
pub const GPIO_MODE_IT_FALLING: u32 = 0x1021_0000;

// GPIO pull
pub const GPIO_NOPULL: u32 = 0x0000_0000;
pub const GPIO_PULLUP: u32 = 0x0000_0001;
pub const GPIO_PULLDOWN: u32 = 0x0000_0002;

// GPIO output speed
pub const GPIO_SPEED_FREQ_LOW: u32 = 0x0000_0000;
pub const GPIO_SPEED_FREQ_MEDIUM: u32 = 0x0000_0001;
pub const GPIO_SPEED_FREQ_HIGH: u32 = 0x0000_0002;
pub const GPIO_SPEED_FREQ_VERY_HIGH: u32 = 0x0000_0003;

// GPIO alternate function selectors
pub const GPIO_AF4_I2C1: u32 = 0x04;
pub const GPIO_AF4_I2C2: u32 = 0x04;
pub const GPIO_AF5_SPI1: u32 = 0x05;
pub const GPIO_AF5_SPI2: u32 = 0x05;
pub const GPIO_AF6_SPI3: u32 = 0x06;
pub const GPIO_AF7_USART3: u32 = 0x07;

// SPI
pub const SPI_CR1_MSTR: u32 = 0x0000_0004;
pub const SPI_CR1_SSI: u32 = 0x0000_0100;
pub const SPI_MODE_SLAVE: u32 = 0x0000_0000;
pub const SPI_MODE_MASTER: u32 = SPI_CR1_MSTR | SPI_CR1_SSI;
pub const SPI_DIRECTION_2LINES: u32 = 0x0000_0000;
pub const SPI_DIRECTION_2LINES_RXONLY: u32 = 0x0000_0400;
pub const SPI_DIRECTION_1LINE: u32 = 0x0000_8000;
pub const SPI_DATASIZE_8BIT: u32 = 0x0000_0000;
pub const SPI_DATASIZE_16BIT: u32 = 0x0000_0800;
pub const SPI_POLARITY_LOW: u32 = 0x0000_0000;
pub const SPI_POLARITY_HIGH: u32 = 0x0000_0002;
pub const SPI_PHASE_1EDGE: u32 = 0x0000_0000;
pub const SPI_PHASE_2EDGE: u32 = 0x0000_0001;
pub const SPI_NSS_SOFT: u32 = 0x0000_0200;
pub const SPI_NSS_HARD_INPUT: u32 = 0x0000_0000;
pub const SPI_NSS_HARD_OUTPUT: u32 = 0x0004_0000;
pub const SPI_FIRSTBIT_MSB: u32 = 0x0000_0000;
pub const SPI_FIRSTBIT_LSB: u32 = 0x0000_0080;
pub const SPI_TIMODE_DISABLE: u32 = 0x0000_0000;
pub const SPI_TIMODE_ENABLE: u32 = 0x0000_0010;
pub const SPI_CRCCALCULATION_DISABLE: u32 = 0x0000_0000;
pub const SPI_CRCCALCULATION_ENABLE: u32 = 0x0000_2000;
pub const SPI_BAUDRATEPRESCALER_2: u32 = 0x0000_0000;
pub const SPI_BAUDRATEPRESCALER_4: u32 = 0x0000_0008;
pub const SPI_BAUDRATEPRESCALER_8: u32 = 0x0000_0010;
pub const SPI_BAUDRATEPRESCALER_16: u32 = 0x0000_0018;
pub const SPI_BAUDRATEPRESCALER_32: u32 = 0x0000_0020;
pub const SPI_BAUDRATEPRESCALER_64: u32 = 0x0000_0028;
pub const SPI_BAUDRATEPRESCALER_128: u32 = 0x0000_0030;
pub const SPI_BAUDRATEPRESCALER_256: u32 = 0x0000_0038;

// I2C
pub const I2C_CR1_PE: u32 = 0x0000_0001;
pub const I2C_CR1_SWRST: u32 = 0x0000_8000;
pub const I2C_DUTYCYCLE_2: u32 = 0x0000_0000;
pub const I2C_DUTYCYCLE_16_9: u32 = 0x0000_4000;
pub const I2C_ADDRESSINGMODE_7BIT: u32 = 0x0000_4000;
pub const I2C_DUALADDRESS_DISABLE: u32 = 0x0000_0000;
pub const I2C_GENERALCALL_DISABLE: u32 = 0x0000_0000;
pub const I2C_NOSTRETCH_DISABLE: u32 = 0x0000_0000;
pub const I2C_MEMADD_SIZE_8BIT: u16 = 0x0001;

// USART
pub const USART_CR1_PS: u32 = 0x0000_0200;
pub const USART_CR1_PCE: u32 = 0x0000_0400;
pub const UART_WORDLENGTH_8B: u32 = 0x0000_0000;
pub const UART_STOPBITS_1: u32 = 0x0000_0000;
pub const UART_PARITY_NONE: u32 = 0x0000_0000;
pub const UART_PARITY_EVEN: u32 = USART_CR1_PCE;
pub const UART_MODE_RX: u32 = 0x0000_0004;
pub const UART_MODE_TX: u32 = 0x0000_0008;
pub const UART_HWCONTROL_NONE: u32 = 0x0000_0000;
pub const UART_OVERSAMPLING_16: u32 = 0x0000_0000;

// NVIC priority for the EXTI and USART lines this crate enables
pub const PERIPHERAL_IRQ_PREEMPT_PRIORITY: u32 = 3;
pub const PERIPHERAL_IRQ_SUB_PRIORITY: u32 = 0;
