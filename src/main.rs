//! Home controller firmware — main entry point.
//!
//! Hexagonal architecture: the [`Controller`] core is pure logic, and
//! every hardware touchpoint goes through an adapter.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                   Adapters (outer ring)                  │
//! │                                                          │
//! │   GpioIo        LogSink        NvsStorage    ClockAdapter│
//! │   (IoPort)      (MessagePort)  (StoragePort) (ClockPort) │
//! │                                                          │
//! │  ──────────────── Port Trait Boundary ────────────────   │
//! │                                                          │
//! │  ┌────────────────────────────────────────────────────┐  │
//! │  │            Controller (pure logic)                 │  │
//! │  │  arbiter · devices · timers · schedule             │  │
//! │  └────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! The loop runs one scrutation every 100 ms: inputs, timers, schedule,
//! button gestures, watchdog.
#![deny(unused_must_use)]

use anyhow::{Context, Result};
use core::ffi::c_void;
use log::{info, warn};

use homectrl::adapters::hardware::{BUTTON_GPIO, GpioIo};
use homectrl::adapters::log_sink::LogSink;
use homectrl::adapters::nvs::NvsStorage;
use homectrl::adapters::time::ClockAdapter;
use homectrl::app::Controller;
use homectrl::drivers::button::{ButtonDriver, ButtonEvent, button_isr_handler};
use homectrl::drivers::watchdog::Watchdog;

/// I/O scrutation period.
const SCRUTATION_MS: u32 = 100;

extern "C" fn on_button_isr(_arg: *mut c_void) {
    let now_ms = (unsafe { esp_idf_svc::sys::esp_timer_get_time() } / 1000) as u32;
    button_isr_handler(now_ms);
}

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("homectrl v{}", env!("CARGO_PKG_VERSION"));

    let watchdog = Watchdog::new();

    // ── 2. Adapters ───────────────────────────────────────────
    let mut storage = NvsStorage::new()
        .map_err(|e| anyhow::anyhow!("{e}"))
        .context("NVS init failed")?;
    let mut io = GpioIo::new().context("GPIO init failed")?;
    let mut bus = LogSink::new();

    // ── 3. Controller: load documents, replay device state ────
    let mut ctl = Controller::new();
    ctl.load(&storage);
    let mut clock = ClockAdapter::new(ctl.params().summer_time);
    ctl.restore_outputs(&mut io, &mut bus, clock.uptime_ms());

    // ── 4. Front-panel button ISR ─────────────────────────────
    let mut button = ButtonDriver::new(BUTTON_GPIO);
    unsafe {
        use esp_idf_svc::sys::*;
        let ret = gpio_install_isr_service(0);
        if ret != ESP_OK && ret != ESP_ERR_INVALID_STATE {
            warn!("ISR service init failed ({ret}), button disabled");
        } else {
            esp!(gpio_set_intr_type(
                button.gpio(),
                gpio_int_type_t_GPIO_INTR_NEGEDGE
            ))?;
            esp!(gpio_isr_handler_add(
                button.gpio(),
                Some(on_button_isr),
                core::ptr::null_mut()
            ))?;
        }
    }

    info!("system ready, entering scrutation loop");

    // ── 5. Scrutation loop ────────────────────────────────────
    loop {
        let now_ms = clock.uptime_ms();

        ctl.tick(now_ms, &clock, &mut io, &mut bus, &mut storage);
        // A delay-params write may have flipped the daylight flag.
        clock.set_summer_time(ctl.params().summer_time);

        if let Some(gesture) = button.tick(now_ms as u32) {
            match gesture {
                ButtonEvent::SingleClick => ctl.on_single_click(),
                ButtonEvent::DoubleClick => ctl.on_double_click(),
            }
        }

        if ctl.restart_pending() {
            warn!("restart requested, rebooting");
            unsafe {
                esp_idf_svc::sys::esp_restart();
            }
        }

        watchdog.feed();
        esp_idf_hal::delay::FreeRtos::delay_ms(SCRUTATION_MS);
    }
}
