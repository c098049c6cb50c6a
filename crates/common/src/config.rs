use std::{collections::HashSet, fs::File};

use clap::Parser;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Default)]
pub struct RelayConfig {
    pub postgres: PostgresConfig,
    pub redis: RedisConfig,
    pub simulator: SimulatorConfig,
    #[serde(default)]
    pub beacon_clients: Vec<BeaconClientConfig>,
    #[serde(default)]
    pub network_config: NetworkConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub relay: RelayKeyConfig,
    pub router_config: RouterConfig,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Accept blacklisted/low-prio gated submissions with a silent 200.
    #[serde(default)]
    pub low_prio_builders_disabled: bool,
    /// Skip publishing unblinded blocks to the beacon network after reveal.
    #[serde(default)]
    pub disable_block_publishing: bool,
}

impl RelayConfig {
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let start_config = StartConfig::parse();
        let file = File::open(start_config.config)?;
        let config: RelayConfig = serde_yaml::from_reader(file)?;
        Ok(config)
    }
}

#[derive(Serialize, Deserialize, Clone, Default)]
pub struct PostgresConfig {
    pub hostname: String,
    pub port: u16,
    pub db_name: String,
    pub user: String,
    pub password: String,
}

#[derive(Serialize, Deserialize, Clone, Default)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Serialize, Deserialize, Clone, Default)]
pub struct SimulatorConfig {
    pub url: String,
}

#[derive(Serialize, Deserialize, Clone)]
pub struct BeaconClientConfig {
    pub url: String,
}

#[derive(Serialize, Deserialize, Clone, Default)]
pub struct RelayKeyConfig {
    /// Hex-encoded BLS secret key the relay signs bids with.
    pub secret_key: String,
}

#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq, Eq)]
pub enum NetworkConfig {
    #[default]
    Mainnet,
    Goerli,
    Sepolia,
    Custom {
        genesis_time: u64,
    },
}

#[derive(Default, Serialize, Deserialize, Clone)]
pub enum LoggingConfig {
    #[default]
    Console,
    File {
        dir_path: String,
        file_name: String,
    },
}

#[derive(Serialize, Deserialize, Clone)]
pub struct LimitsConfig {
    /// Bounded concurrency of the simulation gate.
    pub max_concurrent_simulations: usize,
    /// Workers per registration channel.
    pub registration_workers: usize,
    /// Capacity of each registration channel.
    pub registration_channel_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_concurrent_simulations: 4,
            registration_workers: 10,
            registration_channel_size: 450_000,
        }
    }
}

fn default_bind_address() -> String {
    "0.0.0.0:4040".to_string()
}

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
#[clap(name = "relay")]
pub struct StartConfig {
    #[clap(long, default_value = "config.yml")]
    pub config: String,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize, Default)]
pub struct RouterConfig {
    pub enabled_routes: HashSet<Route>,
}

impl RouterConfig {
    /// Resolves condensed variants into the real routes they stand for.
    pub fn resolve_condensed_routes(&mut self) {
        if self.enabled_routes.contains(&Route::All) {
            self.enabled_routes.remove(&Route::All);
            self.enabled_routes.extend([
                Route::BuilderApi,
                Route::ProposerApi,
                Route::DataApi,
                Route::InternalApi,
            ]);
        }

        self.replace_condensed_with_real(
            Route::BuilderApi,
            &[Route::GetValidators, Route::SubmitBlock],
        );

        self.replace_condensed_with_real(
            Route::ProposerApi,
            &[Route::Status, Route::RegisterValidators, Route::GetHeader, Route::GetPayload],
        );

        self.replace_condensed_with_real(
            Route::DataApi,
            &[
                Route::ProposerPayloadDelivered,
                Route::BuilderBidsReceived,
                Route::ValidatorRegistration,
            ],
        );

        self.replace_condensed_with_real(
            Route::InternalApi,
            &[Route::BuilderStatus, Route::BuilderCollateral],
        );
    }

    fn replace_condensed_with_real(&mut self, special_variant: Route, real_routes: &[Route]) {
        if self.enabled_routes.contains(&special_variant) {
            self.enabled_routes.remove(&special_variant);
            self.enabled_routes.extend(real_routes.iter().cloned());
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Route {
    All,
    BuilderApi,
    ProposerApi,
    DataApi,
    InternalApi,
    GetValidators,
    SubmitBlock,
    Status,
    RegisterValidators,
    GetHeader,
    GetPayload,
    ProposerPayloadDelivered,
    BuilderBidsReceived,
    ValidatorRegistration,
    BuilderStatus,
    BuilderCollateral,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn condensed_routes_resolve_to_real_ones() {
        let mut config =
            RouterConfig { enabled_routes: [Route::All].iter().cloned().collect() };
        config.resolve_condensed_routes();

        assert!(!config.enabled_routes.contains(&Route::All));
        assert!(config.enabled_routes.contains(&Route::SubmitBlock));
        assert!(config.enabled_routes.contains(&Route::GetPayload));
        assert!(config.enabled_routes.contains(&Route::BuilderBidsReceived));
        assert!(config.enabled_routes.contains(&Route::BuilderStatus));
    }

    #[test]
    fn config_round_trips_through_yaml() {
        let mut config = RelayConfig::default();
        config.redis.url = "redis://localhost:6379".to_string();
        config.simulator.url = "http://localhost:8545".to_string();
        config.beacon_clients.push(BeaconClientConfig { url: "http://localhost:5052".to_string() });
        config.router_config =
            RouterConfig { enabled_routes: [Route::All].iter().cloned().collect() };

        let encoded = serde_yaml::to_string(&config).unwrap();
        let decoded: RelayConfig = serde_yaml::from_str(&encoded).unwrap();
        assert_eq!(decoded.redis.url, config.redis.url);
        assert_eq!(decoded.limits.registration_channel_size, 450_000);
    }
}
