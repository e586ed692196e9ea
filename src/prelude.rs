pub use crate::config::{AuthVersion, GanderConfiguration, OAuthConfig};
pub use crate::extract::{VariableRule, VariableRules};
pub use crate::load_test::{run_load_test, LoadTestSummary, WorkerOutcome};
pub use crate::oauth::{AuthorizedDispatch, CredentialState, OAuthClient, RequestMethod};
pub use crate::rest_test::{run_test_cases, summary_table, TestCases};
pub use crate::scenario::{run_scenario, LoadTestPlan, ScenarioReport, StepError, WorkerLog};
pub use crate::session::{Session, SessionCache, Token};
pub use crate::template::Variables;
pub use crate::transport::GanderResponse;
pub use crate::GanderError;
