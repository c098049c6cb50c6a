use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge_vec, IntCounter,
    IntCounterVec, IntGaugeVec,
};

lazy_static! {
    /// Live tasks per spawn site, see [`crate::task::spawn`].
    pub static ref TASK_COUNT: IntGaugeVec =
        register_int_gauge_vec!("relay_task_count", "Live background tasks", &["location"])
            .unwrap();

    pub static ref SIMULATION_STATUS: IntCounterVec = register_int_counter_vec!(
        "relay_simulation_status_total",
        "Block simulation results",
        &["ok"]
    )
    .unwrap();

    pub static ref SIMULATOR_QUEUE_DEPTH: IntGaugeVec = register_int_gauge_vec!(
        "relay_simulator_queue_depth",
        "Simulation requests waiting for a slot",
        &["prio"]
    )
    .unwrap();

    pub static ref DEMOTION_COUNT: IntCounter =
        register_int_counter!("relay_builder_demotions_total", "Builder demotions").unwrap();

    /// Registrations dropped because a worker channel was full. Drop-on-full is
    /// deliberate, so drops must stay observable.
    pub static ref REGISTRATION_CHANNEL_DROPS: IntCounterVec = register_int_counter_vec!(
        "relay_registration_channel_drops_total",
        "Validator registrations dropped on channel overflow",
        &["channel"]
    )
    .unwrap();

    pub static ref TOP_BID_UPDATE_COUNT: IntCounter =
        register_int_counter!("relay_top_bid_updates_total", "Top bid recomputations").unwrap();
}

pub struct SimulatorMetrics;

impl SimulatorMetrics {
    pub fn sim_status(ok: bool) {
        SIMULATION_STATUS.with_label_values(&[if ok { "true" } else { "false" }]).inc();
    }

    pub fn demotion_count() {
        DEMOTION_COUNT.inc();
    }

    pub fn queue_depth(prio: &str, depth: i64) {
        SIMULATOR_QUEUE_DEPTH.with_label_values(&[prio]).set(depth);
    }
}
