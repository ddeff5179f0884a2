//! Account commands.

use hardware_storefront::auth::{Credentials, Registration};
use hardware_storefront::error::StorefrontError;
use hardware_storefront::models::User;
use hardware_storefront::{AuthError, AuthStatus};
use secrecy::SecretString;

use super::Context;

/// Sign in and store the session.
pub async fn login(ctx: &Context, email: String, password: String) -> Result<(), StorefrontError> {
    let user = ctx.auth.login(&Credentials::new(email, password)).await?;
    println!("Signed in as {}", describe(&user));
    Ok(())
}

/// Create an account and sign in.
pub async fn register(
    ctx: &Context,
    name: String,
    email: String,
    password: String,
    phone: Option<String>,
) -> Result<(), StorefrontError> {
    let user = ctx
        .auth
        .register(&Registration {
            name,
            email,
            password: SecretString::from(password),
            phone,
        })
        .await?;
    println!("Account created, signed in as {}", describe(&user));
    Ok(())
}

/// Sign out.
pub async fn logout(ctx: &Context) {
    ctx.auth.logout().await;
    println!("Signed out");
}

/// Print the signed-in account, refreshed from the backend.
pub async fn whoami(ctx: &Context) -> Result<(), StorefrontError> {
    if ctx.resolve_session().await == AuthStatus::Unauthenticated {
        println!("Not signed in");
        return Ok(());
    }

    match ctx.auth.profile().await {
        Ok(user) => {
            println!("{}", describe(&user));
            if let Some(phone) = &user.phone {
                println!("  phone:   {phone}");
            }
            if let Some(address) = &user.address {
                println!("  address: {address}");
            }
            Ok(())
        }
        Err(AuthError::NotAuthenticated) => {
            println!("Not signed in");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn describe(user: &User) -> String {
    if user.name.is_empty() {
        user.email.to_string()
    } else {
        format!("{} <{}>", user.name, user.email)
    }
}
