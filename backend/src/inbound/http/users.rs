//! Account routes: registration, activation, password reset, and the
//! current-user lookup. All but the last stay outside the auth boundary.

use actix_web::http::Method;
use actix_web::{web, HttpResponse};
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::entities;
use crate::domain::field::FieldValue;
use crate::domain::ports::MailMessage;
use crate::domain::record::Record;
use crate::domain::schema::EntityKind;

use super::auth::{hash_password, Authenticated};
use super::crud::{parse_body, preflight};
use super::envelope;
use super::state::AppState;

const MSG_STORAGE: &str = "Storage unavailable";

pub fn scope() -> actix_web::Scope {
    web::scope("/user")
        .route("", web::get().to(current))
        .route("/register", web::post().to(register))
        .route("/register", web::method(Method::OPTIONS).to(preflight))
        .route("/activate/{token}", web::get().to(activate))
        .route(
            "/request_reset_password/{email}",
            web::get().to(request_reset_password),
        )
        .route("/reset_password/{token}", web::post().to(reset_password))
        .route(
            "/reset_password/{token}",
            web::method(Method::OPTIONS).to(preflight),
        )
}

/// Credentials and tokens never leave the server.
fn sanitized(mut record: Record) -> Record {
    record.remove("password");
    record.remove("confirm_password");
    record.remove("activation_token");
    record
}

async fn current(auth: Authenticated) -> HttpResponse {
    envelope::ok(sanitized(auth.user))
}

async fn register(state: web::Data<AppState>, body: web::Bytes) -> HttpResponse {
    let Some(payload) = parse_body(&body) else {
        return envelope::general_error("Incorrect request");
    };
    let mut record = Record::from_json(EntityKind::User, &payload);
    let errors =
        match entities::validate(EntityKind::User, &record, state.store.as_ref(), None, None).await
        {
            Ok(errors) => errors,
            Err(err) => {
                error!(error = %err, "registration lookup failed");
                return envelope::general_error(MSG_STORAGE);
            }
        };
    if !errors.is_empty() {
        return envelope::field_errors(&errors);
    }

    // Deterministic per-account token; re-registration attempts for the
    // same name/email pair resolve to the same activation link.
    let token = hash_password(&format!(
        "{}{}",
        record.text("name").unwrap_or_default(),
        record.text("email").unwrap_or_default()
    ));
    if let Some(password) = record.text("password") {
        record.set("password", FieldValue::Text(hash_password(&password)));
    }
    record.remove("confirm_password");
    record.set("active", FieldValue::Integer(0));
    record.set("activation_token", FieldValue::Text(token.clone()));

    let created = match state.store.insert(EntityKind::User, &record, None).await {
        Ok(created) => created,
        Err(err) => {
            error!(error = %err, "registration insert failed");
            return envelope::general_error(MSG_STORAGE);
        }
    };
    info!(uid = ?created.uid(), "user registered");

    if let Some(email) = created.text("email") {
        let message = MailMessage {
            to: email,
            subject: "Account activation".to_owned(),
            body: format!("Your activation token: {token}"),
            attachment: None,
        };
        // A failed mail leaves the account registered but inactive; the
        // token can be re-sent through the password-reset flow.
        if let Err(err) = state.mailer.send(message).await {
            warn!(error = %err, "activation mail failed");
        }
    }
    envelope::ok(sanitized(created))
}

async fn activate(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let token = path.into_inner();
    if token.trim().is_empty() {
        return envelope::general_error("Incorrect token");
    }
    let user = match state
        .store
        .find_by_field(EntityKind::User, "activation_token", &token)
        .await
    {
        Ok(Some(user)) => user,
        Ok(None) => return envelope::general_error("Incorrect token"),
        Err(err) => {
            error!(error = %err, "activation lookup failed");
            return envelope::general_error(MSG_STORAGE);
        }
    };
    let Some(rid) = user.uid() else {
        return envelope::general_error("Incorrect token");
    };
    let mut changes = Record::new();
    changes.set("active", FieldValue::Integer(1));
    changes.set("activation_token", FieldValue::Text(String::new()));
    match state
        .store
        .update(EntityKind::User, &rid, &changes, None)
        .await
    {
        Ok(()) => {
            info!(uid = %rid, "account activated");
            envelope::ok(json!({"activated": true}))
        }
        Err(err) => {
            error!(error = %err, "activation update failed");
            envelope::general_error(MSG_STORAGE)
        }
    }
}

async fn request_reset_password(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> HttpResponse {
    let email = path.into_inner();
    if email.trim().is_empty() {
        return envelope::field_errors(
            &[("email".to_owned(), "Empty value".to_owned())].into(),
        );
    }
    let user = match state
        .store
        .find_by_field(EntityKind::User, "email", &email)
        .await
    {
        Ok(Some(user)) => user,
        // Do not reveal whether the address is registered.
        Ok(None) => return envelope::ok(json!({"sent": true})),
        Err(err) => {
            error!(error = %err, "reset lookup failed");
            return envelope::general_error(MSG_STORAGE);
        }
    };
    let Some(rid) = user.uid() else {
        return envelope::general_error(MSG_STORAGE);
    };
    let token = Uuid::new_v4().to_string();
    let mut changes = Record::new();
    changes.set("activation_token", FieldValue::Text(token.clone()));
    if let Err(err) = state
        .store
        .update(EntityKind::User, &rid, &changes, None)
        .await
    {
        error!(error = %err, "reset token update failed");
        return envelope::general_error(MSG_STORAGE);
    }
    let message = MailMessage {
        to: email,
        subject: "Password reset".to_owned(),
        body: format!("Your password reset token: {token}"),
        attachment: None,
    };
    if let Err(err) = state.mailer.send(message).await {
        warn!(error = %err, "reset mail failed");
        return envelope::general_error("Mail delivery failed");
    }
    envelope::ok(json!({"sent": true}))
}

async fn reset_password(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Bytes,
) -> HttpResponse {
    let token = path.into_inner();
    let Some(payload) = parse_body(&body) else {
        return envelope::general_error("Incorrect request");
    };
    let incoming = Record::from_json(EntityKind::User, &payload);
    let password = incoming.text("password").unwrap_or_default();
    let confirm = incoming.text("confirm_password").unwrap_or_default();
    if password.trim().is_empty() {
        return envelope::field_errors(
            &[("password".to_owned(), "Empty value".to_owned())].into(),
        );
    }
    if password != confirm {
        return envelope::field_errors(
            &[("confirm_password".to_owned(), "Incorrect value".to_owned())].into(),
        );
    }
    let user = match state
        .store
        .find_by_field(EntityKind::User, "activation_token", &token)
        .await
    {
        Ok(Some(user)) => user,
        Ok(None) => return envelope::general_error("Incorrect token"),
        Err(err) => {
            error!(error = %err, "reset lookup failed");
            return envelope::general_error(MSG_STORAGE);
        }
    };
    let Some(rid) = user.uid() else {
        return envelope::general_error("Incorrect token");
    };
    let mut changes = Record::new();
    changes.set("password", FieldValue::Text(hash_password(&password)));
    changes.set("activation_token", FieldValue::Text(String::new()));
    changes.set("active", FieldValue::Integer(1));
    match state
        .store
        .update(EntityKind::User, &rid, &changes, None)
        .await
    {
        Ok(()) => {
            info!(uid = %rid, "password reset");
            envelope::ok(json!({"reset": true}))
        }
        Err(err) => {
            error!(error = %err, "password update failed");
            envelope::general_error(MSG_STORAGE)
        }
    }
}
