use crate::cli::actions::{server, users, Action};
use anyhow::Result;

/// Execute the provided action.
// Single dispatch point for all CLI actions.
/// # Errors
/// Returns an error if the action fails.
pub async fn execute(action: Action) -> Result<()> {
    match action {
        Action::Server(args) => server::execute(args).await,
        Action::CreateSuperuser(args) => users::create_superuser(args).await,
        Action::AddDevice(args) => users::add_device(args).await,
    }
}
