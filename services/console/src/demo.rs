use crate::infra::{paid_settlement, InMemoryMerchantBackend};
use chrono::NaiveDate;
use clap::Args;
use merchant_onboarding::backend::ClientError;
use merchant_onboarding::config::DEFAULT_UPLOAD_MAX_BYTES;
use merchant_onboarding::error::AppError;
use merchant_onboarding::listing::ListQuery;
use merchant_onboarding::onboarding::domain::{
    DeliveryCategory, DeliveryCategorySelection, EmploymentStatus, FormKind,
};
use merchant_onboarding::onboarding::{
    DuplicatePolicy, FileHandle, FlowView, IndividualRegistration, MemoryDraftStore,
    OnboardingService, OnboardingServiceError, Toast, ToastBuffer, UploadSlot,
};
use merchant_onboarding::session::SessionContext;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const SAMPLE_PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
const SAMPLE_PDF: &[u8] = b"%PDF-1.4\n%demo\n";
const DEMO_PASSWORD: &str = "Dem0!rider";

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Passport photograph to upload. Defaults to a built-in sample image.
    #[arg(long)]
    pub(crate) passport: Option<PathBuf>,
    /// Vehicle paper to upload as NAME=PATH. Repeatable.
    #[arg(long = "paper", value_parser = parse_paper)]
    pub(crate) papers: Vec<(String, PathBuf)>,
    /// Fail the first submission with a transport error to show the retry path.
    #[arg(long)]
    pub(crate) fail_first_submit: bool,
}

fn parse_paper(raw: &str) -> Result<(String, PathBuf), String> {
    let (name, path) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=PATH, got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("document name is missing in '{raw}'"));
    }
    Ok((name.to_string(), PathBuf::from(path.trim())))
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        passport,
        papers,
        fail_first_submit,
    } = args;

    let backend = Arc::new(InMemoryMerchantBackend::default());
    if fail_first_submit {
        backend.fail_next_submit(ClientError::Transport(
            "simulated network outage".to_string(),
        ));
    }
    let service = OnboardingService::new(
        backend.clone(),
        Arc::new(MemoryDraftStore::default()),
        DEFAULT_UPLOAD_MAX_BYTES,
    );
    let session = SessionContext::anonymous("/onboarding/individual").with_token("demo-token");

    println!("Merchant onboarding demo");
    let view = service
        .start(FormKind::IndividualRegistration, None, &session)
        .await?;
    let id = view.id;
    render_view(&view);

    let values =
        serde_json::to_value(sample_rider()).map_err(OnboardingServiceError::InvalidValues)?;
    service.update_values(id, values, None).await?;

    let passport = match passport {
        Some(path) => load_file(&path)?,
        None => sample_file("passport.png", SAMPLE_PNG),
    };
    let asset = service
        .upload(id, passport, UploadSlot::PassportPhoto, &session)
        .await?;
    println!("\nUploaded passport photograph -> {}", asset.remote_url);

    let mut uploads = Vec::new();
    for (name, path) in &papers {
        uploads.push((name.clone(), load_file(path)?));
    }
    if uploads.is_empty() {
        uploads.push((
            "Road worthiness".to_string(),
            sample_file("road-worthiness.pdf", SAMPLE_PDF),
        ));
    }
    for (name, file) in uploads {
        let slot = UploadSlot::vehicle_paper(name.clone(), DuplicatePolicy::Replace);
        let asset = service.upload(id, file, slot, &session).await?;
        println!("Uploaded vehicle paper '{name}' -> {}", asset.remote_url);
    }

    for _ in 0..2 {
        let view = service.next(id).await?;
        render_view(&view);
    }

    let toasts = ToastBuffer::default();
    let outcome = match service.submit(id, &session, &toasts).await {
        Ok(outcome) => outcome,
        Err(err) => {
            println!("\nSubmission failed: {err}");
            render_toasts(&toasts.drain());
            println!("Retrying the same request...");
            service.retry(id, &session, &toasts).await?
        }
    };
    render_toasts(&toasts.drain());
    println!("Redirect -> {}", outcome.redirect);

    let merchant_id = outcome
        .response
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    backend.record_settlement(paid_settlement(&merchant_id, "REF-DEMO-0001", 12_500.0));

    let partners = service
        .partners(&ListQuery::default(), &session)
        .await
        .map_err(OnboardingServiceError::from)?;
    println!(
        "\nPartners (page {} of {})",
        partners.pagination.current_page, partners.pagination.total_pages
    );
    for partner in &partners.items {
        println!("  {:<10} {:<20} {:?}", partner.id, partner.name, partner.status);
    }

    let query = ListQuery::page(1).with_status(["paid"]);
    let settlements = service
        .settlements(&query, &session)
        .await
        .map_err(OnboardingServiceError::from)?;
    println!("\nSettlements ({})", query.location("/settlements"));
    for settlement in &settlements.items {
        println!(
            "  {:<16} {:<10} {:>10.2}",
            settlement.reference, settlement.merchant_id, settlement.amount
        );
    }

    Ok(())
}

fn sample_rider() -> IndividualRegistration {
    IndividualRegistration {
        first_name: "Ada".to_string(),
        last_name: "Obi".to_string(),
        email: "ada@courier.ng".to_string(),
        phone_number: "08098765432".to_string(),
        date_of_birth: NaiveDate::from_ymd_opt(1994, 4, 12),
        address: "4 Allen Avenue, Ikeja".to_string(),
        employment_status: Some(EmploymentStatus::SelfEmployed),
        delivery_categories: DeliveryCategorySelection::new().with(DeliveryCategory::Motorcycle),
        password: DEMO_PASSWORD.to_string(),
        confirm_password: DEMO_PASSWORD.to_string(),
        ..IndividualRegistration::default()
    }
}

fn load_file(path: &Path) -> Result<FileHandle, AppError> {
    let bytes = std::fs::read(path)?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    Ok(FileHandle::new(file_name, mime_guess::from_path(path).first(), bytes))
}

fn sample_file(file_name: &str, bytes: &[u8]) -> FileHandle {
    FileHandle::new(
        file_name,
        Some(mime_guess::from_path(file_name).first_or_octet_stream()),
        bytes.to_vec(),
    )
}

fn render_view(view: &FlowView) {
    println!(
        "\nPage {} of {}: {}",
        view.page,
        view.total_pages,
        view.title.unwrap_or("-")
    );
    if view.page_violations.is_empty() {
        println!("  page is complete");
    } else {
        println!("  outstanding: {}", view.page_violations);
    }
    if view.can_submit {
        println!("  ready to submit");
    }
}

fn render_toasts(toasts: &[Toast]) {
    for toast in toasts {
        let retry = if toast.retryable { " [try again]" } else { "" };
        println!("  [{:?}] {}: {}{retry}", toast.level, toast.title, toast.message);
    }
}
