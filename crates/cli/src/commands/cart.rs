//! Cart maintenance.

use tracing::info;

use pronto_bot::commerce::Commerce;

/// Delete one user's cart on the commerce service.
///
/// # Errors
///
/// Returns an error if the deletion fails.
pub async fn reset(owner: &str) -> Result<(), Box<dyn std::error::Error>> {
    let commerce = super::commerce_client_from_env()?;
    commerce.delete_cart(owner).await?;
    info!(owner = %owner, "cart deleted");
    Ok(())
}
