use uuid::Uuid;

use crate::auth::RequestContext;
use crate::error::ApiError;

/// Decide whether the caller may act on a resource owned by `target_tenant`.
///
/// Allowed when the caller is that tenant, or when the token carries the
/// platform-admin role. Every mutation on a resource whose tenant differs
/// from the caller's must pass through here; there is no other bypass.
///
/// Denials are deliberately vague so a probing caller cannot learn whether
/// the target tenant exists.
pub fn authorize(ctx: &RequestContext, target_tenant: Uuid) -> Result<(), ApiError> {
    if ctx.is_platform_admin() || ctx.tenant_id() == target_tenant {
        return Ok(());
    }

    tracing::warn!(
        caller = %ctx.tenant_id(),
        "cross-tenant write denied"
    );
    Err(ApiError::forbidden("Not allowed"))
}
