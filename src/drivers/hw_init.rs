//! One-shot hardware peripheral initialization.
//!
//! Configures the ADC1 oneshot unit for both MQ sensors, the buzzer output
//! and the DHT open-drain line using raw ESP-IDF sys calls. Called once
//! from `main()` before the sampling loop starts.

#[cfg(target_os = "espidf")]
use core::sync::atomic::{AtomicPtr, Ordering};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;
#[cfg(target_os = "espidf")]
use log::info;

#[cfg(target_os = "espidf")]
use crate::error::DriverError;
use crate::pins::{self, PinMap};

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    AdcInitFailed(i32),
    /// GPIO is not routed to ADC1.
    NotAnAdcPin(i32),
    GpioConfigFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AdcInitFailed(rc) => write!(f, "ADC1 init failed (rc={rc})"),
            Self::NotAnAdcPin(gpio) => write!(f, "GPIO{gpio} has no ADC1 channel"),
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={rc})"),
        }
    }
}

impl core::error::Error for HwInitError {}

/// Configure every peripheral used by the board.
#[cfg(target_os = "espidf")]
pub fn init_peripherals(pins: &PinMap) -> Result<(), HwInitError> {
    // SAFETY: Called once from main() before the sampling loop; single-threaded.
    unsafe {
        init_adc(pins)?;
        init_buzzer(pins.buzzer_gpio)?;
        init_dht_line(pins.dht_gpio)?;
    }
    info!("hw_init: all peripherals configured");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals(pins: &PinMap) -> Result<(), HwInitError> {
    for gpio in [pins.mq135_adc_gpio, pins.mq2_adc_gpio] {
        pins::adc1_channel(gpio).ok_or(HwInitError::NotAnAdcPin(gpio))?;
    }
    log::info!("hw_init(sim): peripheral init skipped");
    Ok(())
}

// ── ADC (oneshot) ─────────────────────────────────────────────

#[cfg(target_os = "espidf")]
static ADC1_HANDLE: AtomicPtr<adc_oneshot_unit_ctx_t> = AtomicPtr::new(core::ptr::null_mut());

#[cfg(target_os = "espidf")]
unsafe fn init_adc(pins: &PinMap) -> Result<(), HwInitError> {
    let init_cfg = adc_oneshot_unit_init_cfg_t {
        unit_id: adc_unit_t_ADC_UNIT_1,
        ulp_mode: adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
        ..Default::default()
    };
    let mut handle: adc_oneshot_unit_handle_t = core::ptr::null_mut();
    let ret = unsafe { adc_oneshot_new_unit(&init_cfg, &mut handle) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::AdcInitFailed(ret));
    }

    // 12 dB attenuation: full 0–3.3 V swing of the load resistor.
    let chan_cfg = adc_oneshot_chan_cfg_t {
        atten: adc_atten_t_ADC_ATTEN_DB_12,
        bitwidth: adc_bitwidth_t_ADC_BITWIDTH_12,
    };
    for gpio in [pins.mq135_adc_gpio, pins.mq2_adc_gpio] {
        let channel = pins::adc1_channel(gpio).ok_or(HwInitError::NotAnAdcPin(gpio))?;
        let ret = unsafe { adc_oneshot_config_channel(handle, channel, &chan_cfg) };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::AdcInitFailed(ret));
        }
    }

    ADC1_HANDLE.store(handle, Ordering::Release);
    info!(
        "hw_init: ADC1 configured (GPIO{}=MQ-135, GPIO{}=MQ-2)",
        pins.mq135_adc_gpio, pins.mq2_adc_gpio
    );
    Ok(())
}

/// Whether the ADC1 unit has been created.
#[cfg(target_os = "espidf")]
pub fn adc_ready() -> bool {
    !ADC1_HANDLE.load(Ordering::Acquire).is_null()
}

/// One oneshot conversion on ADC1.
#[cfg(target_os = "espidf")]
pub fn adc1_read(channel: u32) -> Result<u16, DriverError> {
    let handle = ADC1_HANDLE.load(Ordering::Acquire);
    if handle.is_null() {
        return Err(DriverError::NotInitialised);
    }
    let mut raw: i32 = 0;
    // SAFETY: handle was created by init_adc() and is never freed; reads
    // happen from the main loop only.
    let ret = unsafe { adc_oneshot_read(handle, channel, &mut raw) };
    if ret != ESP_OK as i32 {
        return Err(DriverError::AdcReadFailed);
    }
    u16::try_from(raw).map_err(|_| DriverError::InvalidData)
}

// ── Buzzer output ─────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_buzzer(gpio: i32) -> Result<(), HwInitError> {
    let cfg = gpio_config_t {
        pin_bit_mask: 1u64 << gpio,
        mode: gpio_mode_t_GPIO_MODE_OUTPUT,
        pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
        intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
    };
    let ret = unsafe { gpio_config(&cfg) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::GpioConfigFailed(ret));
    }
    unsafe { gpio_set_level(gpio, 0) };
    info!("hw_init: buzzer on GPIO{gpio}");
    Ok(())
}

// ── DHT line (open drain, idles high via pull-up) ─────────────

#[cfg(target_os = "espidf")]
unsafe fn init_dht_line(gpio: i32) -> Result<(), HwInitError> {
    let cfg = gpio_config_t {
        pin_bit_mask: 1u64 << gpio,
        mode: gpio_mode_t_GPIO_MODE_INPUT_OUTPUT_OD,
        pull_up_en: gpio_pullup_t_GPIO_PULLUP_ENABLE,
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
        intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
    };
    let ret = unsafe { gpio_config(&cfg) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::GpioConfigFailed(ret));
    }
    unsafe { gpio_set_level(gpio, 1) };
    info!("hw_init: DHT line on GPIO{gpio}");
    Ok(())
}

// ── GPIO helpers ──────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub fn gpio_read(pin: i32) -> bool {
    // SAFETY: gpio_get_level is a read-only register access on an
    // already-configured pin.
    (unsafe { gpio_get_level(pin) }) != 0
}

#[cfg(target_os = "espidf")]
pub fn gpio_write(pin: i32, high: bool) {
    // SAFETY: pin was configured as an output during init; main-loop only.
    unsafe {
        gpio_set_level(pin, u32::from(high));
    }
}

/// Microseconds since boot.
#[cfg(target_os = "espidf")]
pub fn micros() -> i64 {
    // SAFETY: esp_timer is started by the IDF before app_main.
    unsafe { esp_timer_get_time() }
}

#[cfg(target_os = "espidf")]
pub fn delay_us(us: u32) {
    // SAFETY: busy-wait ROM routine, no shared state.
    unsafe { esp_rom_delay_us(us) };
}
