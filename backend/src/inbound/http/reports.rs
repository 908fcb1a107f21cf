//! Report routes: the CRUD set plus the type listing and the generation
//! endpoint that renders HTML, PDF, or mails the PDF out.

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};

use crate::domain::ports::MailMessage;
use crate::domain::schema::{report_type_name, EntityKind, REPORT_TYPES};
use crate::reports::kudir;
use crate::reports::workdir::ReportWorkdir;

use super::auth::Authenticated;
use super::crud::crud_routes;
use super::envelope;
use super::state::AppState;

pub fn scope() -> actix_web::Scope {
    crud_routes(
        web::scope("/report")
            .app_data(web::Data::new(EntityKind::Report))
            .route("/types", web::get().to(types)),
    )
}

async fn types(_auth: Authenticated) -> HttpResponse {
    let listed: Vec<_> = REPORT_TYPES
        .iter()
        .map(|(key, name)| json!({"type": key, "name": name}))
        .collect();
    envelope::ok(listed)
}

#[derive(Debug, Deserialize)]
pub struct GenerateParams {
    email: Option<String>,
}

/// `GET /report/generate/{companyId}/{type}/{period}/{format}` with
/// format ∈ {html, pdf, email}. The destination address for the email
/// format comes from the `email` query parameter, falling back to the
/// authenticated user's own address.
pub async fn generate(
    state: web::Data<AppState>,
    auth: Authenticated,
    path: web::Path<(String, String, String, String)>,
    params: web::Query<GenerateParams>,
) -> HttpResponse {
    let (company_id, report_type, period, format) = path.into_inner();
    if report_type_name(&report_type).is_none() {
        return envelope::general_error("Incorrect report type");
    }
    let owner = auth.uid();
    let data = match kudir::get_data(state.store.as_ref(), owner.as_ref(), &company_id, &period)
        .await
    {
        Ok(data) => data,
        Err(err) => {
            error!(error = %err, "report data fetch failed");
            return envelope::general_error("Report generation failed");
        }
    };

    match format.as_str() {
        "html" => HttpResponse::Ok()
            .content_type("text/html; charset=utf-8")
            .body(kudir::generate_html(&data)),
        // html renders the error heading for blank data itself; the binary
        // formats answer through the envelope instead.
        "pdf" if data.is_blank() => envelope::general_error("Report generation failed"),
        "pdf" => match render_pdf(&state, &data).await {
            Ok(bytes) => HttpResponse::Ok()
                .content_type("application/pdf")
                .insert_header((
                    "Content-Disposition",
                    format!("attachment; filename=\"kudir_{period}.pdf\""),
                ))
                .body(bytes),
            Err(err) => {
                error!(error = %err, "pdf generation failed");
                envelope::general_error("Report generation failed")
            }
        },
        "email" if data.is_blank() => HttpResponse::Ok()
            .content_type("text/plain; charset=utf-8")
            .body("Report sending failed"),
        "email" => {
            let email = params
                .into_inner()
                .email
                .filter(|address| !address.trim().is_empty())
                .or_else(|| auth.email());
            let Some(email) = email.filter(|address| !address.trim().is_empty()) else {
                return HttpResponse::Ok()
                    .content_type("text/plain; charset=utf-8")
                    .body("Report sending failed");
            };
            let bytes = match render_pdf(&state, &data).await {
                Ok(bytes) => bytes,
                Err(err) => {
                    error!(error = %err, "pdf generation failed");
                    return HttpResponse::Ok()
                        .content_type("text/plain; charset=utf-8")
                        .body("Report sending failed");
                }
            };
            let message = MailMessage {
                to: email,
                subject: format!("KUDiR {period}"),
                body: "Generated report attached.".to_owned(),
                attachment: Some((format!("kudir_{period}.pdf"), bytes)),
            };
            let body = match state.mailer.send(message).await {
                Ok(()) => {
                    info!(%period, "report mailed");
                    "Report sent"
                }
                Err(err) => {
                    warn!(error = %err, "report mail failed");
                    "Report sending failed"
                }
            };
            HttpResponse::Ok()
                .content_type("text/plain; charset=utf-8")
                .body(body)
        }
        _ => envelope::general_error("Incorrect format"),
    }
}

/// Render through a scoped working directory; the intermediate files and
/// the directory itself are removed before the response leaves.
async fn render_pdf(
    state: &AppState,
    data: &kudir::KudirData,
) -> Result<Vec<u8>, kudir::ReportError> {
    let workdir = ReportWorkdir::create(&state.config.web.cache_dir).await?;
    let rendered = kudir::generate_pdf(data, &workdir).await;
    if let Err(err) = workdir.cleanup().await {
        warn!(error = %err, "workdir cleanup failed");
    }
    rendered
}
