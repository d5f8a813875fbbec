//! Per-channel radio parameters
//!
//! A channel is one radio block plus the DDC it feeds and the DUC that feeds
//! it. Setters are idempotent and return what the hardware actually applied.

use tracing::{info, warn};

use crate::runtime::{BlockId, BlockKind, Device, RadioError, RadioResult};

const CHAN: usize = 0;
const PORT: usize = 0;

/// Frequency, gain, antenna and bandwidth for one direction of a radio
#[derive(Debug, Clone, PartialEq)]
pub struct FrontEnd {
    pub frequency_hz: f64,
    pub gain_db: f64,
    pub antenna: String,
    pub bandwidth_hz: f64,
}

/// Rates negotiated with the adjoining rate converters
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ConverterRates {
    pub ddc_input_hz: f64,
    pub ddc_output_hz: f64,
    pub duc_input_hz: f64,
    pub duc_output_hz: f64,
}

/// Live rx and tx carrier of one radio
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tuning {
    pub rx_hz: f64,
    pub tx_hz: f64,
}

/// Last values the hardware accepted for a channel
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChannelState {
    pub rx: Option<FrontEnd>,
    pub tx: Option<FrontEnd>,
    pub radio_rate_hz: Option<f64>,
    pub rates: Option<ConverterRates>,
    pub samples_per_packet: Option<u32>,
    pub rx_timestamps: Option<bool>,
}

impl ChannelState {
    pub fn rx_frequency(&self) -> Option<f64> {
        self.rx.as_ref().map(|fe| fe.frequency_hz)
    }

    pub fn tx_frequency(&self) -> Option<f64> {
        self.tx.as_ref().map(|fe| fe.frequency_hz)
    }
}

/// Parameter set for one radio channel and its rate converters
pub struct ChannelConfig {
    index: u32,
    radio: BlockId,
    ddc: BlockId,
    duc: BlockId,
    state: ChannelState,
}

impl ChannelConfig {
    /// Channel `index` on `device`: `Radio#i` feeding `DDC#i`, fed by `DUC#i`
    pub fn new(device: u32, index: u32) -> Self {
        Self {
            index,
            radio: BlockId::new(device, BlockKind::Radio, index),
            ddc: BlockId::new(device, BlockKind::DownConverter, index),
            duc: BlockId::new(device, BlockKind::UpConverter, index),
            state: ChannelState::default(),
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn radio(&self) -> BlockId {
        self.radio
    }

    pub fn ddc(&self) -> BlockId {
        self.ddc
    }

    pub fn duc(&self) -> BlockId {
        self.duc
    }

    pub fn state(&self) -> &ChannelState {
        &self.state
    }

    pub fn set_rx<D: Device + ?Sized>(&mut self, device: &mut D, settings: &FrontEnd) -> RadioResult {
        let radio = &self.radio;
        let applied = FrontEnd {
            frequency_hz: device.set_rx_frequency(radio, settings.frequency_hz, CHAN)?,
            gain_db: device.set_rx_gain(radio, settings.gain_db, CHAN)?,
            antenna: {
                device.set_rx_antenna(radio, &settings.antenna, CHAN)?;
                settings.antenna.clone()
            },
            bandwidth_hz: device.set_rx_bandwidth(radio, settings.bandwidth_hz, CHAN)?,
        };
        log_coerced(radio, "rx gain", settings.gain_db, applied.gain_db);
        log_coerced(radio, "rx bandwidth", settings.bandwidth_hz, applied.bandwidth_hz);

        info!(
            "{} rx: {} Hz, {} dB, antenna {}, bandwidth {} Hz",
            radio, applied.frequency_hz, applied.gain_db, applied.antenna, applied.bandwidth_hz
        );
        self.state.rx = Some(applied);
        Ok(())
    }

    pub fn set_tx<D: Device + ?Sized>(&mut self, device: &mut D, settings: &FrontEnd) -> RadioResult {
        let radio = &self.radio;
        let applied = FrontEnd {
            frequency_hz: device.set_tx_frequency(radio, settings.frequency_hz, CHAN)?,
            gain_db: device.set_tx_gain(radio, settings.gain_db, CHAN)?,
            antenna: {
                device.set_tx_antenna(radio, &settings.antenna, CHAN)?;
                settings.antenna.clone()
            },
            bandwidth_hz: device.set_tx_bandwidth(radio, settings.bandwidth_hz, CHAN)?,
        };
        log_coerced(radio, "tx gain", settings.gain_db, applied.gain_db);
        log_coerced(radio, "tx bandwidth", settings.bandwidth_hz, applied.bandwidth_hz);

        info!(
            "{} tx: {} Hz, {} dB, antenna {}, bandwidth {} Hz",
            radio, applied.frequency_hz, applied.gain_db, applied.antenna, applied.bandwidth_hz
        );
        self.state.tx = Some(applied);
        Ok(())
    }

    pub fn enable_rx_timestamps<D: Device + ?Sized>(&mut self, device: &mut D, enable: bool) -> RadioResult {
        device.enable_rx_timestamps(&self.radio, enable, CHAN)?;
        self.state.rx_timestamps = Some(enable);
        Ok(())
    }

    /// Set the radio's native rate; returns the achieved rate
    pub fn set_radio_rate<D: Device + ?Sized>(&mut self, device: &mut D, hz: f64) -> RadioResult<f64> {
        let achieved = device.set_radio_rate(&self.radio, hz)?;
        log_coerced(&self.radio, "radio rate", hz, achieved);
        self.state.radio_rate_hz = Some(achieved);
        Ok(achieved)
    }

    /// Set the working rate between the converters and the FIRs.
    ///
    /// The DDC input and DUC output stay at the radio's native rate (or the
    /// DDC's current input rate if the radio rate was never set). The
    /// converters pick the nearest rate their divisors allow; the achieved
    /// rates are returned and logged, never rolled back.
    pub fn set_sample_rate<D: Device + ?Sized>(&mut self, device: &mut D, hz: f64) -> RadioResult<ConverterRates> {
        let radio_rate = match self.state.radio_rate_hz {
            Some(rate) => rate,
            None => device.input_rate(&self.ddc, PORT)?,
        };

        device.set_input_rate(&self.ddc, radio_rate, PORT)?;
        device.set_output_rate(&self.ddc, hz, PORT)?;
        device.set_output_rate(&self.duc, radio_rate, PORT)?;
        device.set_input_rate(&self.duc, hz, PORT)?;

        let rates = ConverterRates {
            ddc_input_hz: device.input_rate(&self.ddc, PORT)?,
            ddc_output_hz: device.output_rate(&self.ddc, PORT)?,
            duc_input_hz: device.input_rate(&self.duc, PORT)?,
            duc_output_hz: device.output_rate(&self.duc, PORT)?,
        };

        log_rate(&self.ddc, "output", hz, rates.ddc_output_hz);
        log_rate(&self.ddc, "input", radio_rate, rates.ddc_input_hz);
        log_rate(&self.duc, "input", hz, rates.duc_input_hz);
        log_rate(&self.duc, "output", radio_rate, rates.duc_output_hz);

        self.state.rates = Some(rates);
        Ok(rates)
    }

    /// Transport unit hint for the radio's streamer
    pub fn set_samples_per_packet<D: Device + ?Sized>(&mut self, device: &mut D, n: u32) -> RadioResult {
        if n == 0 {
            return Err(RadioError::InvalidSamplesPerPacket);
        }
        device.set_property(&self.radio, &format!("spp:{}", CHAN), &n.to_string())?;
        self.state.samples_per_packet = Some(n);
        Ok(())
    }

    /// Carrier frequencies as the hardware currently reports them
    pub fn tuning<D: Device + ?Sized>(&self, device: &D) -> RadioResult<Tuning> {
        Ok(Tuning {
            rx_hz: device.rx_frequency(&self.radio, CHAN)?,
            tx_hz: device.tx_frequency(&self.radio, CHAN)?,
        })
    }

    /// Put rx and tx back to a previously read [`Tuning`]
    pub fn restore_tuning<D: Device + ?Sized>(&mut self, device: &mut D, tuning: &Tuning) -> RadioResult {
        let rx_hz = device.set_rx_frequency(&self.radio, tuning.rx_hz, CHAN)?;
        let tx_hz = device.set_tx_frequency(&self.radio, tuning.tx_hz, CHAN)?;
        if let Some(rx) = self.state.rx.as_mut() {
            rx.frequency_hz = rx_hz;
        }
        if let Some(tx) = self.state.tx.as_mut() {
            tx.frequency_hz = tx_hz;
        }
        info!("{} restored: rx {} Hz, tx {} Hz", self.radio, rx_hz, tx_hz);
        Ok(())
    }

    /// Move rx and tx to `hz` together.
    ///
    /// Either both frequencies change or neither does: if the tx side is
    /// rejected, the rx side is put back to its previous frequency.
    pub fn retune<D: Device + ?Sized>(&mut self, device: &mut D, hz: f64) -> RadioResult {
        let previous_rx = device.rx_frequency(&self.radio, CHAN)?;

        device.set_rx_frequency(&self.radio, hz, CHAN)?;
        if let Err(e) = device.set_tx_frequency(&self.radio, hz, CHAN) {
            if let Err(restore) = device.set_rx_frequency(&self.radio, previous_rx, CHAN) {
                warn!("{} could not restore rx frequency {} Hz: {}", self.radio, previous_rx, restore);
            }
            return Err(e.into());
        }

        let rx_hz = device.rx_frequency(&self.radio, CHAN)?;
        let tx_hz = device.tx_frequency(&self.radio, CHAN)?;
        if let Some(rx) = self.state.rx.as_mut() {
            rx.frequency_hz = rx_hz;
        }
        if let Some(tx) = self.state.tx.as_mut() {
            tx.frequency_hz = tx_hz;
        }

        info!("{} retuned: rx {} Hz, tx {} Hz", self.radio, rx_hz, tx_hz);
        Ok(())
    }
}

fn log_rate(block: &BlockId, side: &str, wanted: f64, got: f64) {
    if (wanted - got).abs() > f64::EPSILON * wanted.abs().max(1.0) {
        warn!("{} {} rate wanted: {} got: {}", block, side, wanted, got);
    } else {
        info!("{} {} rate wanted: {} got: {}", block, side, wanted, got);
    }
}

fn log_coerced(block: &BlockId, what: &str, wanted: f64, got: f64) {
    if wanted != got {
        warn!("{} {} coerced from {} to {}", block, what, wanted, got);
    }
}
