use detector::credit::SmearConfig;
use detector::flagger::FlagConfig;

fn default_confidence_level() -> f64 { 0.9999 }
fn default_smear_window() -> usize { 1 }
fn default_smear_weights() -> String { "0.5,0.5".to_string() }
fn default_min_slots() -> u64 { 50 }
fn default_output_dir() -> String { "reports".to_string() }
fn default_max_concurrent_fetches() -> usize { num_cpus::get() }
fn default_metrics_port() -> u16 { 9102 }

#[derive(Debug, serde::Deserialize, Clone)]
pub struct RunConfig {
    #[serde(alias = "RPC_URL")]
    pub rpc_url: String,
    #[serde(alias = "START_SLOT")]
    pub start_slot: u64,
    #[serde(alias = "END_SLOT")]
    pub end_slot: u64,
    #[serde(alias = "CONFIDENCE_LEVEL", default = "default_confidence_level")]
    pub confidence_level: f64,
    #[serde(alias = "SMEAR_WINDOW", default = "default_smear_window")]
    pub smear_window: usize,
    #[serde(alias = "SMEAR_WEIGHTS", default = "default_smear_weights")]
    pub smear_weights: String,
    #[serde(alias = "MIN_SLOTS", default = "default_min_slots")]
    pub min_slots: u64,
    #[serde(alias = "EXCLUSION_LIST_PATH")]
    pub exclusion_list_path: Option<String>,
    #[serde(alias = "VALIDATOR_NAMES_PATH")]
    pub validator_names_path: Option<String>,
    #[serde(alias = "OUTPUT_DIR", default = "default_output_dir")]
    pub output_dir: String,
    #[serde(alias = "DATABASE_URL")]
    pub database_url: Option<String>,
    #[serde(alias = "MAX_CONCURRENT_FETCHES", default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,
    #[serde(alias = "METRICS_PORT", default = "default_metrics_port")]
    pub metrics_port: u16,
}

impl RunConfig {
    pub fn new() -> Result<Self, String> {
        let s = ::config::Config::builder()
            .add_source(::config::Environment::default())
            .build()
            .map_err(|e| format!("Config Build Error: {}", e))?;

        let config: RunConfig = s.try_deserialize()
            .map_err(|e| format!("Config Deserialize Error: {}", e))?;

        config.validate()?;
        Ok(config)
    }

    /// Validates configuration values at startup (Fail Fast). An invalid
    /// confidence level or smear curve would silently bias every statistic
    /// downstream, so the run halts before any aggregation begins.
    pub fn validate(&self) -> Result<(), String> {
        if !self.rpc_url.starts_with("http") {
            return Err(format!("Invalid RPC_URL: must start with http/https. Got: {}", self.rpc_url));
        }
        if self.start_slot > self.end_slot {
            return Err(format!(
                "START_SLOT ({}) must not exceed END_SLOT ({})",
                self.start_slot, self.end_slot
            ));
        }
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(format!(
                "CONFIDENCE_LEVEL must be in (0, 1). Got: {}",
                self.confidence_level
            ));
        }
        self.smear_config().map(|_| ())?;
        if self.max_concurrent_fetches == 0 {
            return Err("MAX_CONCURRENT_FETCHES cannot be 0".into());
        }
        Ok(())
    }

    pub fn smear_config(&self) -> Result<SmearConfig, String> {
        let weights: Vec<f64> = self
            .smear_weights
            .split(',')
            .map(|w| w.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|e| format!("Invalid SMEAR_WEIGHTS '{}': {}", self.smear_weights, e))?;
        let cfg = SmearConfig { window: self.smear_window, weights };
        cfg.validate().map_err(|e| e.to_string())?;
        Ok(cfg)
    }

    pub fn flag_config(&self) -> FlagConfig {
        FlagConfig {
            confidence_level: self.confidence_level,
            min_slots: self.min_slots,
        }
    }

    pub fn slot_count(&self) -> u64 {
        self.end_slot - self.start_slot + 1
    }
}


#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
