use crate::bollinger::BollingerParams;
use crate::dmi::DmiParams;
use crate::ema::EmaParams;
use crate::envelope::EnvelopeParams;
use crate::ichimoku::IchimokuParams;
use crate::ma_difference::MaDifferenceParams;
use crate::macd::MacdParams;
use crate::momentum::MomentumParams;
use crate::parabolic::ParabolicParams;
use crate::psychological::PsychologicalParams;
use crate::rci::RciParams;
use crate::rsi::RsiParams;
use crate::sma::SmaParams;
use crate::std_dev::StdDevParams;
use crate::stochastics::StochasticsParams;
use crate::turning_point::TurningPointParams;
use serde::{Deserialize, Serialize};

/// Which indicators a chart shows, and with which parameters.
///
/// Moving averages can appear several times; every other indicator is either
/// off (`None`) or on with one parameter set. Missing fields take their
/// defaults, so a settings file only needs to name what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartSettings {
    pub sma: Vec<SmaParams>,
    pub ema: Vec<EmaParams>,
    pub bollinger: Option<BollingerParams>,
    pub envelope: Option<EnvelopeParams>,
    pub ichimoku: Option<IchimokuParams>,
    pub parabolic: Option<ParabolicParams>,
    pub turning_point: Option<TurningPointParams>,
    pub macd: Option<MacdParams>,
    pub rsi: Option<RsiParams>,
    pub rci: Option<RciParams>,
    pub stochastics: Option<StochasticsParams>,
    pub dmi: Option<DmiParams>,
    pub momentum: Option<MomentumParams>,
    pub std_dev: Option<StdDevParams>,
    pub ma_difference: Option<MaDifferenceParams>,
    pub psychological: Option<PsychologicalParams>,
}

fn conventional_spans() -> [usize; 3] {
    [5, 25, 75]
}

impl Default for ChartSettings {
    fn default() -> Self {
        Self {
            sma: conventional_spans().into_iter().map(SmaParams::new).collect(),
            ema: Vec::new(),
            bollinger: None,
            envelope: None,
            ichimoku: None,
            parabolic: None,
            turning_point: None,
            macd: None,
            rsi: None,
            rci: None,
            stochastics: None,
            dmi: None,
            momentum: None,
            std_dev: None,
            ma_difference: None,
            psychological: None,
        }
    }
}

impl ChartSettings {
    /// Every indicator enabled with its default parameters.
    pub fn all() -> Self {
        Self {
            sma: conventional_spans().into_iter().map(SmaParams::new).collect(),
            ema: conventional_spans().into_iter().map(EmaParams::new).collect(),
            bollinger: Some(BollingerParams::default()),
            envelope: Some(EnvelopeParams::default()),
            ichimoku: Some(IchimokuParams::default()),
            parabolic: Some(ParabolicParams::default()),
            turning_point: Some(TurningPointParams::default()),
            macd: Some(MacdParams::default()),
            rsi: Some(RsiParams::default()),
            rci: Some(RciParams::default()),
            stochastics: Some(StochasticsParams::default()),
            dmi: Some(DmiParams::default()),
            momentum: Some(MomentumParams::default()),
            std_dev: Some(StdDevParams::default()),
            ma_difference: Some(MaDifferenceParams::default()),
            psychological: Some(PsychologicalParams::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::macd::SignalType;
    use tchart_core::PriceSource;

    #[test]
    fn test_defaults_show_three_smas() {
        let settings = ChartSettings::default();
        let spans: Vec<_> = settings.sma.iter().map(|p| p.span).collect();
        assert_eq!(spans, vec![5, 25, 75]);
        assert!(settings.macd.is_none());
    }

    #[test]
    fn test_toml_overrides_only_named_fields() {
        let settings: ChartSettings = toml::from_str(
            r#"
            ema = [{ span = 9 }, { span = 21, source = "high" }]

            [macd]
            signal_type = "sma"

            [bollinger]
            sigma_rates = [2.0]
            "#,
        )
        .unwrap();

        assert_eq!(settings.sma.len(), 3);
        assert_eq!(settings.ema[1].source, PriceSource::High);
        let macd = settings.macd.unwrap();
        assert_eq!(macd.signal_type, SignalType::Sma);
        assert_eq!(macd.long_span, 26);
        assert_eq!(settings.bollinger.unwrap().span, 20);
        assert!(settings.rsi.is_none());
    }

    #[test]
    fn test_all_round_trips_through_toml() {
        let settings = ChartSettings::all();
        let text = toml::to_string(&settings).unwrap();
        let parsed: ChartSettings = toml::from_str(&text).unwrap();
        assert_eq!(parsed, settings);
    }
}
