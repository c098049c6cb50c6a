pub mod manager;
pub mod mock_simulator;
pub mod optimistic_simulator;
pub mod rpc_simulator;
pub mod traits;

pub use manager::SimulatorManager;
pub use mock_simulator::MockSimulator;
pub use optimistic_simulator::OptimisticSimulator;
pub use rpc_simulator::RpcSimulator;
pub use traits::BlockSimulator;
