//! Clock tree configuration
//!
//! The clock bring-up itself is performed by the vendor driver; this module
//! only describes the requested tree and derives the resulting frequencies.

/// Requested clock tree
///
/// The default runs the PLL from an 8 MHz bypassed HSE at 168 MHz with the
/// APB1 bus at 42 MHz and APB2 at 84 MHz.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockConfig {
    /// External oscillator frequency in Hz
    pub hse_hz: u32,
    /// HSE is driven by an external clock rather than a crystal
    pub hse_bypass: bool,
    /// PLL input divider
    pub pll_m: u32,
    /// PLL multiplier
    pub pll_n: u32,
    /// PLL system clock divider
    pub pll_p: u32,
    /// PLL 48 MHz domain divider
    pub pll_q: u32,
    /// AHB prescaler
    pub ahb_divider: u32,
    /// APB1 prescaler
    pub apb1_divider: u32,
    /// APB2 prescaler
    pub apb2_divider: u32,
    /// Flash wait states
    pub flash_latency: u32,
    /// SysTick interrupt rate in Hz
    pub systick_hz: u32,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            hse_hz: 8_000_000,
            hse_bypass: true,
            pll_m: 8,
            pll_n: 336,
            pll_p: 2,
            pll_q: 7,
            ahb_divider: 1,
            apb1_divider: 4,
            apb2_divider: 2,
            flash_latency: 5,
            systick_hz: 1000,
        }
    }
}

impl ClockConfig {
    /// PLL VCO output frequency
    pub const fn vco_hz(&self) -> u32 {
        self.hse_hz / self.pll_m * self.pll_n
    }

    pub const fn sysclk_hz(&self) -> u32 {
        self.vco_hz() / self.pll_p
    }

    /// Frequency of the 48 MHz domain (USB, SDIO, RNG)
    pub const fn pll48_hz(&self) -> u32 {
        self.vco_hz() / self.pll_q
    }

    pub const fn hclk_hz(&self) -> u32 {
        self.sysclk_hz() / self.ahb_divider
    }

    /// APB1 peripheral clock
    pub const fn pclk1_hz(&self) -> u32 {
        self.hclk_hz() / self.apb1_divider
    }

    /// APB2 peripheral clock
    pub const fn pclk2_hz(&self) -> u32 {
        self.hclk_hz() / self.apb2_divider
    }

    /// SysTick reload value for the configured tick rate
    pub const fn systick_reload(&self) -> u32 {
        self.hclk_hz() / self.systick_hz
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tree() {
        let config = ClockConfig::default();
        assert_eq!(config.sysclk_hz(), 168_000_000);
        assert_eq!(config.hclk_hz(), 168_000_000);
        assert_eq!(config.pclk1_hz(), 42_000_000);
        assert_eq!(config.pclk2_hz(), 84_000_000);
        assert_eq!(config.pll48_hz(), 48_000_000);
        assert_eq!(config.systick_reload(), 168_000);
    }

    #[test]
    fn test_custom_dividers() {
        let config = ClockConfig {
            apb1_divider: 2,
            ahb_divider: 2,
            ..Default::default()
        };
        assert_eq!(config.hclk_hz(), 84_000_000);
        assert_eq!(config.pclk1_hz(), 42_000_000);
    }
}
