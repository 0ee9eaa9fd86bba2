mod chart;
mod execute_sql;
mod generate_sql;
mod give_up;
mod synthesize;

pub use chart::ChartStep;
pub use execute_sql::ExecuteSqlStep;
pub use generate_sql::GenerateSqlStep;
pub use give_up::GiveUpStep;
pub use synthesize::SynthesizeStep;

pub const SQL_GENERATOR: &str = "sql_generator";
pub const SQL_EXECUTOR: &str = "sql_executor";
pub const ANSWER_SYNTHESIZER: &str = "answer_synthesizer";
pub const VISUALIZER: &str = "visualizer";
pub const GIVE_UP: &str = "give_up";
