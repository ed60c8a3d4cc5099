//! Hardware adapter — bridges the relay board GPIOs to [`IoPort`].
//!
//! This is the only module in the system that touches actual output
//! hardware. The heat-pump contactor coil is wired normally closed
//! (de-energized = unit powered), so its electrical level is inverted
//! here; the domain core always speaks in logical "device on" terms.
//! Input contacts are active-low with pull-ups and are normalized the
//! same way.
//!
//! On non-espidf targets the adapter is a plain shadow-state stub for
//! simulation.

use crate::app::ports::IoPort;
use crate::lines::{InputLine, OutputLine};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

/// Front-panel button, falling-edge ISR.
pub const BUTTON_GPIO: i32 = 0;

/// Relay driver pins, indexed by [`OutputLine`].
const OUTPUT_PINS: [i32; 8] = [25, 26, 27, 14, 12, 13, 4, 5];

/// Contact input pins, indexed by [`InputLine`]. Input-only GPIOs.
const INPUT_PINS: [i32; 3] = [34, 35, 32];

pub struct GpioIo {
    /// Logical commanded state, for read-back and the status snapshot.
    outputs: [bool; 8],
}

impl GpioIo {
    /// Configure every line and drive all outputs to their logical-off
    /// level.
    pub fn new() -> anyhow::Result<Self> {
        #[cfg(target_os = "espidf")]
        {
            let out_mask = OUTPUT_PINS.iter().fold(0u64, |m, p| m | (1 << p));
            let cfg = gpio_config_t {
                pin_bit_mask: out_mask,
                mode: gpio_mode_t_GPIO_MODE_OUTPUT,
                pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
                pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
                intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
            };
            let ret = unsafe { gpio_config(&cfg) };
            anyhow::ensure!(ret == ESP_OK, "output gpio_config failed: {ret}");

            let in_mask = INPUT_PINS.iter().fold(0u64, |m, p| m | (1 << p));
            let cfg = gpio_config_t {
                pin_bit_mask: in_mask,
                mode: gpio_mode_t_GPIO_MODE_INPUT,
                // 34/35 have no internal pull; the board carries external ones.
                pull_up_en: gpio_pullup_t_GPIO_PULLUP_ENABLE,
                pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
                intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
            };
            let ret = unsafe { gpio_config(&cfg) };
            anyhow::ensure!(ret == ESP_OK, "input gpio_config failed: {ret}");
        }

        let mut io = Self {
            outputs: [false; 8],
        };
        for line in OutputLine::ALL {
            io.write(line, false);
        }
        Ok(io)
    }

    /// Electrical level for a logical state; hides the NC coil.
    const fn level_for(line: OutputLine, on: bool) -> bool {
        match line {
            OutputLine::HeatPump => !on,
            _ => on,
        }
    }
}

impl IoPort for GpioIo {
    fn write(&mut self, line: OutputLine, on: bool) {
        self.outputs[line as usize] = on;
        #[cfg(target_os = "espidf")]
        {
            let level = u32::from(Self::level_for(line, on));
            unsafe {
                gpio_set_level(OUTPUT_PINS[line as usize], level);
            }
        }
        #[cfg(not(target_os = "espidf"))]
        let _ = Self::level_for(line, on);
    }

    fn read_output(&self, line: OutputLine) -> bool {
        self.outputs[line as usize]
    }

    fn read_contact(&self, line: InputLine) -> bool {
        #[cfg(target_os = "espidf")]
        {
            // Active-low: closed contact pulls the pin to ground.
            unsafe { gpio_get_level(INPUT_PINS[line as usize]) == 0 }
        }
        #[cfg(not(target_os = "espidf"))]
        {
            let _ = line;
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_is_readable_back() {
        let mut io = GpioIo::new().unwrap();
        io.write(OutputLine::Pump, true);
        assert!(io.read_output(OutputLine::Pump));
        assert!(!io.read_output(OutputLine::Vmc));
    }

    #[test]
    fn heat_pump_level_is_inverted() {
        assert!(!GpioIo::level_for(OutputLine::HeatPump, true));
        assert!(GpioIo::level_for(OutputLine::HeatPump, false));
        assert!(GpioIo::level_for(OutputLine::Pump, true));
    }
}
