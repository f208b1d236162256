//! Reusable WWCP node runtime.
//!
//! [`NodeHandle`] builds the roaming network from configuration, exposes it
//! over the overlay WebSocket server, keeps the optional uplink alive and
//! shuts everything down gracefully.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::application::events::{create_event_bus, SharedEventBus};
use crate::config::{node_id, parse_id, AppConfig, ConfigError, LogFormat, LoggingConfig, RoamingNetworkConfig};
use crate::domain::entities::RoamingNetwork;
use crate::domain::error::DomainError;
use crate::domain::ids::{
    ChargingPoolId, ChargingStationId, ChargingStationOperatorId, EMobilityProviderId, EvseId,
    RoamingNetworkId,
};
use crate::overlay::{
    maintain_uplink, LinkRegistry, OverlayRoamingPartner, OverlayRouter, OverlayServer,
    RoamingNetworkHandler, SharedOverlayRouter,
};
use crate::support::shutdown::{ShutdownCoordinator, ShutdownSignal};

#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Initialize tracing (logging) from the logging config.
///
/// `RUST_LOG` wins over the configured level. Call once at process startup.
pub fn init_tracing(config: &LoggingConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.level));

    let result = match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init(),
    };
    if let Err(e) = result {
        eprintln!("Tracing already initialized: {}", e);
    }
}

/// Create the roaming network and the infrastructure listed in the config.
pub fn build_roaming_network(
    config: &RoamingNetworkConfig,
    event_bus: SharedEventBus,
) -> Result<Arc<RoamingNetwork>, NodeError> {
    let id = parse_id("roaming_network.id", &config.id, RoamingNetworkId::parse)?;
    let mut rn = RoamingNetwork::new(id, config.name.clone(), event_bus);
    if let Some(description) = &config.description {
        rn = rn.with_description(description.clone());
    }

    for op_cfg in &config.operators {
        let op_id = parse_id("operator id", &op_cfg.id, ChargingStationOperatorId::parse)?;
        let operator = rn.create_charging_station_operator(op_id, op_cfg.name.clone())?;

        for pool_cfg in &op_cfg.pools {
            let pool_id = parse_id("pool id", &pool_cfg.id, ChargingPoolId::parse)?;
            let pool = operator.create_charging_pool(pool_id, pool_cfg.name.clone())?;

            for station_cfg in &pool_cfg.stations {
                let station_id = parse_id("station id", &station_cfg.id, ChargingStationId::parse)?;
                let station = operator.create_charging_station(pool.id(), station_id)?;

                for evse in &station_cfg.evses {
                    let evse_id = parse_id("EVSE id", evse, EvseId::parse)?;
                    operator.create_evse(station.id(), evse_id)?;
                }
            }
        }
        info!(
            operator_id = %operator.id(),
            evses = operator.evse_count(),
            "Seeded charging station operator"
        );
    }

    for provider_cfg in &config.providers {
        let provider_id = parse_id("provider id", &provider_cfg.id, EMobilityProviderId::parse)?;
        rn.create_emobility_provider(provider_id, provider_cfg.name.clone())?;
    }

    Ok(Arc::new(rn))
}

/// Handle to a running WWCP node.
pub struct NodeHandle {
    pub roaming_network: Arc<RoamingNetwork>,
    pub router: SharedOverlayRouter,
    pub event_bus: SharedEventBus,
    pub config: AppConfig,

    shutdown: ShutdownCoordinator,
    server_task: JoinHandle<()>,
    uplink_task: Option<JoinHandle<()>>,
}

impl NodeHandle {
    /// Start the node:
    /// 1. Build the roaming network from config
    /// 2. Set up the overlay router, routes and roaming partners
    /// 3. Start the overlay WebSocket server
    /// 4. Connect to the uplink, if configured
    pub async fn start(config: AppConfig) -> Result<Self, NodeError> {
        config.validate()?;
        let local_id = node_id("node.id", &config.node.id)?;
        info!("Starting WWCP node {}...", local_id);

        let event_bus = create_event_bus();
        let roaming_network = build_roaming_network(&config.roaming_network, event_bus.clone())?;

        let handler = Arc::new(RoamingNetworkHandler::new(roaming_network.clone()));
        let router = Arc::new(
            OverlayRouter::new(local_id, LinkRegistry::shared(), handler)
                .with_request_timeout(Duration::from_secs(config.node.request_timeout_secs)),
        );
        for route in &config.node.routes {
            router.add_route(
                node_id("node.routes.destination", &route.destination)?,
                node_id("node.routes.via", &route.via)?,
            );
        }
        if let Some(via) = &config.node.default_route {
            router.set_default_route(Some(node_id("node.default_route", via)?));
        }

        for partner in &config.roaming_network.partners {
            let destination = node_id("roaming_network.partners.node_id", &partner.node_id)?;
            roaming_network.register_roaming_partner(Arc::new(OverlayRoamingPartner::new(
                partner.id.clone(),
                router.clone(),
                destination,
            )))?;
        }

        let shutdown = ShutdownCoordinator::new(config.node.shutdown_timeout);
        let shutdown_signal = shutdown.signal();

        let server = OverlayServer::new(config.node.address(), router.clone(), event_bus.clone())
            .with_shutdown(shutdown_signal.clone());
        let server_task = tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("Overlay server error: {}", e);
            }
        });

        let uplink_task = match &config.node.uplink {
            Some(uplink) => {
                let uplink_id = node_id("node.uplink.node_id", &uplink.node_id)?;
                Some(tokio::spawn(maintain_uplink(
                    uplink.url.clone(),
                    uplink_id,
                    router.clone(),
                    event_bus.clone(),
                    shutdown_signal,
                )))
            }
            None => None,
        };

        info!("🚀 WWCP node started.");

        Ok(Self {
            roaming_network,
            router,
            event_bus,
            config,
            shutdown,
            server_task,
            uplink_task,
        })
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.signal()
    }

    /// Install OS signal listeners (SIGTERM, SIGINT) that trigger shutdown.
    pub fn install_signal_handler(&self) {
        self.shutdown.start_signal_listener();
    }

    pub fn trigger_shutdown(&self) {
        self.shutdown.signal().trigger();
    }

    /// Wait for the node to stop after shutdown has been triggered.
    pub async fn wait(self) {
        info!("⏳ Waiting for node tasks to complete...");
        let Self {
            shutdown,
            server_task,
            uplink_task,
            ..
        } = self;
        let timeout = shutdown.timeout();
        let tasks = async move {
            match server_task.await {
                Ok(()) => info!("Overlay server stopped"),
                Err(e) => error!("Overlay server task panicked: {}", e),
            }
            if let Some(uplink) = uplink_task {
                if let Err(e) = uplink.await {
                    error!("Uplink task panicked: {}", e);
                }
            }
        };
        if tokio::time::timeout(timeout, tasks).await.is_err() {
            warn!("⚠️ Node tasks did not stop within {}s", timeout.as_secs());
        }
        info!("👋 WWCP node shutdown complete");
    }

    /// Trigger shutdown and wait for completion.
    pub async fn shutdown(self) {
        info!("🛑 Shutting down WWCP node...");
        self.trigger_shutdown();
        self.wait().await;
    }

    pub fn is_running(&self) -> bool {
        !self.server_task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{NodeConfig, OperatorConfig, PoolConfig, ProviderConfig, StationConfig};

    fn network_config() -> RoamingNetworkConfig {
        RoamingNetworkConfig {
            operators: vec![OperatorConfig {
                id: "DE*GEF".into(),
                name: "GraphDefined".into(),
                pools: vec![PoolConfig {
                    id: "DE*GEF*P1".into(),
                    name: Some("Depot".into()),
                    stations: vec![StationConfig {
                        id: "DE*GEF*S1".into(),
                        evses: vec!["DE*GEF*E1*1".into(), "DE*GEF*E1*2".into()],
                    }],
                }],
            }],
            providers: vec![ProviderConfig {
                id: "DE*ICE".into(),
                name: "Provider".into(),
            }],
            ..RoamingNetworkConfig::default()
        }
    }

    #[test]
    fn seeds_infrastructure_from_config() {
        let rn = build_roaming_network(&network_config(), create_event_bus()).unwrap();
        assert_eq!(rn.charging_station_operators().len(), 1);
        assert_eq!(rn.evses().len(), 2);
        assert!(rn.contains_evse(&EvseId::parse("DE*GEF*E1*2").unwrap()));
        assert_eq!(rn.emobility_providers().len(), 1);
    }

    #[test]
    fn foreign_evse_fails_seeding() {
        let mut config = network_config();
        config.operators[0].pools[0].stations[0]
            .evses
            .push("DE*ABC*E1*1".into());
        let err = build_roaming_network(&config, create_event_bus())
            .err()
            .expect("seeding should fail");
        assert!(matches!(err, NodeError::Domain(DomainError::Id(_))));
    }

    #[tokio::test]
    async fn starts_and_shuts_down() {
        let config = AppConfig {
            node: NodeConfig {
                id: "TEST-NODE".into(),
                host: "127.0.0.1".into(),
                port: 0,
                shutdown_timeout: 5,
                ..NodeConfig::default()
            },
            roaming_network: RoamingNetworkConfig {
                partners: vec![crate::config::PartnerConfig {
                    id: "hub".into(),
                    node_id: "HUB".into(),
                }],
                ..network_config()
            },
            ..AppConfig::default()
        };

        let handle = NodeHandle::start(config).await.unwrap();
        assert_eq!(handle.router.local_id().as_str(), "TEST-NODE");
        assert_eq!(handle.roaming_network.roaming_partners().len(), 1);
        handle.shutdown().await;
    }
}
