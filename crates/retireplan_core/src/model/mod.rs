mod cash_flow;
mod ids;
mod market;
mod results;

pub use cash_flow::{CashFlowItem, CashflowEvent, FlowDirection, Frequency, UnknownFrequency};
pub use ids::{AssetId, MonthIndex};
pub use market::AssetClass;
pub use results::{
    DeterministicProjection, Injection, MonteCarloResult, SimulationWarning, YearlyRow,
};
