//! ISR-debounced front-panel button with single and double click
//! detection.
//!
//! ## Hardware
//!
//! Active-low momentary switch with external pull-up. GPIO fires on
//! falling edge; the ISR records the raw timestamp into an atomic, and
//! the `tick()` method (called from the main loop at scrutation rate)
//! runs the debounce + gesture state machine.
//!
//! ## Gesture detection
//!
//! | Gesture      | Condition                        | Controller action |
//! |--------------|----------------------------------|-------------------|
//! | Single click | No second press within 300 ms    | defer re-arm      |
//! | Double click | Second press within 300 ms       | defer restart     |
//!
//! Classification waits out the double-click window before reporting a
//! single click, so a double is never preceded by a spurious single.

use core::sync::atomic::{AtomicU32, Ordering};

const DEBOUNCE_MS: u32 = 50;
const DOUBLE_CLICK_WINDOW_MS: u32 = 300;

/// Raw ISR timestamp (milliseconds since boot, truncated to u32).
/// Written by the ISR, read by the main loop.
static BUTTON_ISR_TIMESTAMP: AtomicU32 = AtomicU32::new(0);

/// Button events emitted after gesture classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEvent {
    SingleClick,
    DoubleClick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GestureState {
    Idle,
    WaitSecondPress { first_press_ms: u32 },
}

pub struct ButtonDriver {
    gpio: i32,
    state: GestureState,
    last_isr_ms: u32,
}

impl ButtonDriver {
    pub fn new(gpio: i32) -> Self {
        Self {
            gpio,
            state: GestureState::Idle,
            last_isr_ms: 0,
        }
    }

    /// GPIO pin this button is attached to.
    pub fn gpio(&self) -> i32 {
        self.gpio
    }

    /// Call from the main loop on every scrutation tick. `now_ms` is
    /// the current monotonic time in milliseconds. Returns a classified
    /// gesture event, if any.
    pub fn tick(&mut self, now_ms: u32) -> Option<ButtonEvent> {
        let isr_ms = BUTTON_ISR_TIMESTAMP.load(Ordering::Acquire);
        let new_press = isr_ms != self.last_isr_ms
            && isr_ms != 0
            && isr_ms.wrapping_sub(self.last_isr_ms) >= DEBOUNCE_MS;

        match self.state {
            GestureState::Idle => {
                if new_press {
                    self.last_isr_ms = isr_ms;
                    self.state = GestureState::WaitSecondPress {
                        first_press_ms: now_ms,
                    };
                }
                None
            }

            GestureState::WaitSecondPress { first_press_ms } => {
                let gap = now_ms.wrapping_sub(first_press_ms);

                if new_press {
                    self.last_isr_ms = isr_ms;
                    if gap <= DOUBLE_CLICK_WINDOW_MS {
                        self.state = GestureState::Idle;
                        return Some(ButtonEvent::DoubleClick);
                    }
                    // Stale window: close it as a single, track the new press.
                    self.state = GestureState::WaitSecondPress {
                        first_press_ms: now_ms,
                    };
                    return Some(ButtonEvent::SingleClick);
                }

                if gap > DOUBLE_CLICK_WINDOW_MS {
                    self.state = GestureState::Idle;
                    return Some(ButtonEvent::SingleClick);
                }

                None
            }
        }
    }
}

/// ISR handler — register this on the button GPIO falling edge.
/// Safe to call from interrupt context (lock-free atomic store).
#[allow(unused)]
pub fn button_isr_handler(now_ms: u32) {
    BUTTON_ISR_TIMESTAMP.store(now_ms, Ordering::Release);
}
