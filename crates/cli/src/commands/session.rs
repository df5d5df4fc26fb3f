//! Session commands.

use std::io::Write;

use secrecy::SecretString;

use bikeshop_core::{SessionState, UserProfile};
use bikeshop_storefront::ClientState;

fn describe(out: &mut impl Write, user: &UserProfile) -> std::io::Result<()> {
    writeln!(out, "{} (#{}, {})", user.display_name(), user.id, user.role)?;
    if let Some(email) = &user.email {
        writeln!(out, "  email: {email}")?;
    }
    Ok(())
}

/// Print the signed-in user, or `anonymous`.
pub async fn whoami(
    state: &ClientState,
    out: &mut impl Write,
) -> Result<(), Box<dyn std::error::Error>> {
    match state.resolve_session().await? {
        SessionState::Authenticated(user) => describe(out, &user)?,
        SessionState::Anonymous | SessionState::Unresolved => writeln!(out, "anonymous")?,
    }
    Ok(())
}

pub async fn login(
    state: &ClientState,
    out: &mut impl Write,
    username: &str,
    password: &SecretString,
) -> Result<(), Box<dyn std::error::Error>> {
    let user = state.login(username, password).await?;
    write!(out, "Signed in as ")?;
    describe(out, &user)?;
    writeln!(
        out,
        "Cart: {} item(s), wishlist: {} item(s)",
        state.cart().item_count(),
        state.wishlist().entries().len()
    )?;
    Ok(())
}

pub async fn logout(
    state: &ClientState,
    out: &mut impl Write,
) -> Result<(), Box<dyn std::error::Error>> {
    state.resolve_session().await?;
    state.logout().await?;
    writeln!(out, "Signed out")?;
    Ok(())
}
