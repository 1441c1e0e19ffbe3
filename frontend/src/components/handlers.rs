use gloo_file::futures::read_as_data_url;
use gloo_file::{File as GlooFile, ObjectUrl};
use gloo_timers::callback::Timeout;
use shared::{
    Notice, NoticeLevel, ReportView, ServerEvent, SubmitReportRequest, UserView,
    VerificationState, VerifyResponse,
};
use wasm_bindgen_futures::spawn_local;
use web_sys::DragEvent;
use yew::prelude::*;

use super::events::EventConnection;
use super::utils::{first_image_file, generate_id};
use crate::api;
use crate::{Model, Msg, ReportForm, Toast};

const NOTICE_DISMISS_MS: u32 = 4000;
const SUPERSEDED: &str = "superseded";

pub fn load_current_user(ctx: &Context<Model>) {
    let link = ctx.link().clone();
    spawn_local(async move {
        match api::current_user().await {
            Ok(user) => link.send_message(Msg::UserLoaded(user)),
            Err(e) => {
                log::error!("Failed to load current user: {}", e);
                link.send_message(Msg::UserLoaded(None));
            }
        }
    });
}

pub fn load_reports(ctx: &Context<Model>) {
    let link = ctx.link().clone();
    spawn_local(async move {
        link.send_message(Msg::ReportsLoaded(api::recent_reports().await));
    });
}

pub fn push_notice(model: &mut Model, ctx: &Context<Model>, notice: Notice) -> bool {
    // A newer notice replaces whatever spinner is showing.
    model
        .toasts
        .retain(|toast| toast.notice.level != NoticeLevel::Loading);

    let id = generate_id();
    if notice.level != NoticeLevel::Loading {
        let link = ctx.link().clone();
        Timeout::new(NOTICE_DISMISS_MS, move || {
            link.send_message(Msg::DismissNotice(id));
        })
        .forget();
    }
    model.toasts.push(Toast { id, notice });
    true
}

pub fn handle_user_loaded(model: &mut Model, ctx: &Context<Model>, user: Option<UserView>) -> bool {
    match &user {
        Some(user) => {
            log::info!("Signed in as {}", user.email);
            if model.events.is_none() {
                match EventConnection::open(ctx.link().clone()) {
                    Ok(connection) => model.events = Some(connection),
                    Err(e) => log::error!("Could not open event stream: {}", e),
                }
            }
        }
        None => {
            model.events = None;
            model.events_connected = false;
        }
    }
    model.user = user;
    true
}

pub fn handle_login(model: &mut Model, ctx: &Context<Model>) -> bool {
    let email = model.login_email.trim().to_string();
    if email.is_empty() {
        return push_notice(model, ctx, Notice::error("Please enter your email"));
    }
    let name = Some(model.login_name.trim().to_string()).filter(|n| !n.is_empty());

    let link = ctx.link().clone();
    spawn_local(async move {
        match api::login(&email, name).await {
            Ok(user) => link.send_message(Msg::UserLoaded(Some(user))),
            Err(e) => {
                log::error!("Login failed: {}", e);
                link.send_message(Msg::Notify(Notice::error(format!("Login failed: {}", e))));
            }
        }
    });
    false
}

pub fn handle_logout(ctx: &Context<Model>) -> bool {
    let link = ctx.link().clone();
    spawn_local(async move {
        if let Err(e) = api::logout().await {
            log::error!("Logout request failed: {}", e);
        }
        link.send_message(Msg::LoggedOut);
    });
    false
}

fn reset_verification(model: &mut Model) {
    model.generation += 1;
    model.verification_state = VerificationState::Idle;
    model.verification = None;
}

pub fn handle_logged_out(model: &mut Model) -> bool {
    model.user = None;
    model.events = None;
    model.events_connected = false;
    reset_verification(model);
    true
}

pub fn handle_server_event(model: &mut Model, ctx: &Context<Model>, event: ServerEvent) -> bool {
    match event {
        ServerEvent::Notice { notice } => push_notice(model, ctx, notice),
        ServerEvent::VerificationStateChanged { session_id, state } => {
            log::debug!("Verification {} is {}", session_id, state);
            false
        }
        ServerEvent::BalanceUpdated { balance } => match model.user.as_mut() {
            Some(user) => {
                user.balance = balance;
                true
            }
            None => false,
        },
        ServerEvent::LoggedOut => handle_logged_out(model),
    }
}

pub fn handle_image_selected(model: &mut Model, ctx: &Context<Model>, file: GlooFile) -> bool {
    if !file.raw_mime_type().starts_with("image/") {
        log::warn!("Skipping non-image file: {}", file.name());
        return push_notice(
            model,
            ctx,
            Notice::error(format!("Skipped non-image file: {}", file.name())),
        );
    }

    reset_verification(model);
    model.preview_url = Some(ObjectUrl::from(file.clone()));
    model.preview_data_url = None;

    let generation = model.generation;
    let link = ctx.link().clone();
    let encoded = file.clone();
    spawn_local(async move {
        match read_as_data_url(&encoded).await {
            Ok(data_url) => link.send_message(Msg::PreviewEncoded(generation, data_url)),
            Err(e) => log::error!("Failed to read image: {:?}", e),
        }
    });

    model.file = Some(file);
    true
}

pub fn handle_drop(model: &mut Model, ctx: &Context<Model>, event: DragEvent) -> bool {
    event.prevent_default();
    model.is_dragging = false;

    if let Some(file) = event
        .data_transfer()
        .and_then(|data_transfer| data_transfer.files())
        .and_then(|file_list| first_image_file(&file_list))
    {
        ctx.link().send_message(Msg::ImageSelected(file));
    }

    true
}

pub fn handle_verify(model: &mut Model, ctx: &Context<Model>) -> bool {
    if model.verification_state == VerificationState::Verifying {
        return false;
    }
    let Some(file) = model.file.clone() else {
        return push_notice(model, ctx, Notice::error("Please select an image first"));
    };

    reset_verification(model);
    model.verification_state = VerificationState::Verifying;
    let generation = model.generation;

    let link = ctx.link().clone();
    spawn_local(async move {
        let result = api::verify_image(&file).await;
        link.send_message(Msg::VerifyFinished(generation, result));
    });
    true
}

pub fn handle_verify_finished(
    model: &mut Model,
    ctx: &Context<Model>,
    generation: u64,
    result: Result<VerifyResponse, String>,
) -> bool {
    if generation != model.generation {
        log::info!("Dropping stale verification result {}", generation);
        return false;
    }
    model
        .toasts
        .retain(|toast| toast.notice.level != NoticeLevel::Loading);

    let response = match result {
        Ok(response) => response,
        Err(e) => {
            log::error!("Verification request failed: {}", e);
            model.verification_state = VerificationState::Failure;
            return push_notice(
                model,
                ctx,
                Notice::error(format!("Failed to verify image: {}", e)),
            );
        }
    };

    if response.error.as_deref() == Some(SUPERSEDED) {
        model.verification_state = VerificationState::Idle;
        return true;
    }

    // Notices already arrived live when the event stream is up.
    if !model.events_connected {
        for notice in response.notices {
            if notice.level != NoticeLevel::Loading {
                push_notice(model, ctx, notice);
            }
        }
    }

    model.verification_state = response.state;
    if let Some(result) = &response.result {
        model.form.waste_type = result.waste_type.clone();
        model.form.amount = result.quantity.clone();
    }
    model.verification = response.result;
    true
}

pub fn handle_submit(model: &mut Model, ctx: &Context<Model>) -> bool {
    if model.submitting {
        return false;
    }
    if model.verification_state != VerificationState::Success || model.user.is_none() {
        return push_notice(
            model,
            ctx,
            Notice::error("Please verify the waste before submitting or log in."),
        );
    }

    let request = SubmitReportRequest {
        location: model.form.location.clone(),
        waste_type: model.form.waste_type.clone(),
        amount: model.form.amount.clone(),
        image_preview: model.preview_data_url.clone(),
        verification: model.verification.clone(),
    };
    model.submitting = true;

    let link = ctx.link().clone();
    spawn_local(async move {
        link.send_message(Msg::ReportSubmitted(api::submit_report(&request).await));
    });
    true
}

pub fn handle_report_submitted(
    model: &mut Model,
    ctx: &Context<Model>,
    result: Result<ReportView, String>,
) -> bool {
    model.submitting = false;
    match result {
        Ok(report) => {
            model.reports.insert(0, report);
            model.form = ReportForm::default();
            model.file = None;
            model.preview_url = None;
            model.preview_data_url = None;
            reset_verification(model);
            if !model.events_connected {
                load_current_user(ctx);
            }
            push_notice(
                model,
                ctx,
                Notice::success(
                    "Report submitted successfully! You've earned points for reporting waste.",
                ),
            )
        }
        Err(e) => {
            log::error!("Error submitting report: {}", e);
            push_notice(
                model,
                ctx,
                Notice::error("Failed to submit report. Please try again."),
            )
        }
    }
}

pub fn handle_search_changed(model: &mut Model, ctx: &Context<Model>, query: String) -> bool {
    model.search_query = query.clone();
    if query.trim().is_empty() {
        model.search_results.clear();
        return true;
    }

    let link = ctx.link().clone();
    spawn_local(async move {
        match api::search(&query).await {
            Ok(results) => link.send_message(Msg::SearchResults(query, results)),
            Err(e) => log::error!("Search failed: {}", e),
        }
    });
    true
}
