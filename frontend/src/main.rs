mod api;
mod components;

use components::events::EventConnection;
use components::{handlers, header, notices, report_form, reports_table, results, upload_section};
use gloo_file::{File as GlooFile, ObjectUrl};
use shared::{
    ClassificationResult, Notice, ReportView, SearchResult, ServerEvent, UserView,
    VerificationState, VerifyResponse,
};
use web_sys::DragEvent;
use yew::prelude::*;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ReportField {
    Location,
    WasteType,
    Amount,
}

#[derive(Clone, Default)]
pub struct ReportForm {
    location: String,
    waste_type: String,
    amount: String,
}

struct Toast {
    id: u64,
    notice: Notice,
}

pub enum Msg {
    // Session
    UserLoaded(Option<UserView>),
    LoginEmailChanged(String),
    LoginNameChanged(String),
    Login,
    Logout,
    LoggedOut,
    Server(ServerEvent),
    EventsConnected(bool),

    // Image
    ImageSelected(GlooFile),
    PreviewEncoded(u64, String),
    SetDragging(bool),
    HandleDrop(DragEvent),

    // Verification
    Verify,
    VerifyFinished(u64, Result<VerifyResponse, String>),

    // Report
    FieldChanged(ReportField, String),
    SubmitReport,
    ReportSubmitted(Result<ReportView, String>),
    ReportsLoaded(Result<Vec<ReportView>, String>),

    // Search
    SearchChanged(String),
    SearchResults(String, Vec<SearchResult>),

    // Notices
    Notify(Notice),
    DismissNotice(u64),
}

pub struct Model {
    user: Option<UserView>,
    login_email: String,
    login_name: String,
    events: Option<EventConnection>,
    events_connected: bool,

    file: Option<GlooFile>,
    preview_url: Option<ObjectUrl>,
    preview_data_url: Option<String>,
    is_dragging: bool,

    /// Bumped whenever the image changes or a verification starts; replies
    /// carrying an older value are dropped.
    generation: u64,
    verification_state: VerificationState,
    verification: Option<ClassificationResult>,

    form: ReportForm,
    submitting: bool,
    reports: Vec<ReportView>,

    search_query: String,
    search_results: Vec<SearchResult>,

    toasts: Vec<Toast>,
}

impl Component for Model {
    type Message = Msg;
    type Properties = ();

    fn create(ctx: &Context<Self>) -> Self {
        handlers::load_current_user(ctx);
        handlers::load_reports(ctx);

        Self {
            user: None,
            login_email: String::new(),
            login_name: String::new(),
            events: None,
            events_connected: false,
            file: None,
            preview_url: None,
            preview_data_url: None,
            is_dragging: false,
            generation: 0,
            verification_state: VerificationState::Idle,
            verification: None,
            form: ReportForm::default(),
            submitting: false,
            reports: Vec::new(),
            search_query: String::new(),
            search_results: Vec::new(),
            toasts: Vec::new(),
        }
    }

    fn update(&mut self, ctx: &Context<Self>, msg: Self::Message) -> bool {
        match msg {
            // Session
            Msg::UserLoaded(user) => handlers::handle_user_loaded(self, ctx, user),
            Msg::LoginEmailChanged(email) => {
                self.login_email = email;
                true
            }
            Msg::LoginNameChanged(name) => {
                self.login_name = name;
                true
            }
            Msg::Login => handlers::handle_login(self, ctx),
            Msg::Logout => handlers::handle_logout(ctx),
            Msg::LoggedOut => handlers::handle_logged_out(self),
            Msg::Server(event) => handlers::handle_server_event(self, ctx, event),
            Msg::EventsConnected(connected) => {
                self.events_connected = connected;
                false
            }

            // Image
            Msg::ImageSelected(file) => handlers::handle_image_selected(self, ctx, file),
            Msg::PreviewEncoded(generation, data_url) => {
                if generation == self.generation {
                    self.preview_data_url = Some(data_url);
                }
                false
            }
            Msg::SetDragging(is_dragging) => {
                self.is_dragging = is_dragging;
                true
            }
            Msg::HandleDrop(event) => handlers::handle_drop(self, ctx, event),

            // Verification
            Msg::Verify => handlers::handle_verify(self, ctx),
            Msg::VerifyFinished(generation, result) => {
                handlers::handle_verify_finished(self, ctx, generation, result)
            }

            // Report
            Msg::FieldChanged(field, value) => {
                match field {
                    ReportField::Location => self.form.location = value,
                    ReportField::WasteType => self.form.waste_type = value,
                    ReportField::Amount => self.form.amount = value,
                }
                true
            }
            Msg::SubmitReport => handlers::handle_submit(self, ctx),
            Msg::ReportSubmitted(result) => handlers::handle_report_submitted(self, ctx, result),
            Msg::ReportsLoaded(Ok(reports)) => {
                self.reports = reports;
                true
            }
            Msg::ReportsLoaded(Err(e)) => {
                log::error!("Failed to load reports: {}", e);
                false
            }

            // Search
            Msg::SearchChanged(query) => handlers::handle_search_changed(self, ctx, query),
            Msg::SearchResults(query, results) => {
                if query != self.search_query {
                    return false;
                }
                self.search_results = results;
                true
            }

            // Notices
            Msg::Notify(notice) => handlers::push_notice(self, ctx, notice),
            Msg::DismissNotice(id) => {
                let before = self.toasts.len();
                self.toasts.retain(|toast| toast.id != id);
                before != self.toasts.len()
            }
        }
    }

    fn view(&self, ctx: &Context<Self>) -> Html {
        html! {
            <div class="container">
                { header::render_header(self, ctx) }
                { notices::render_notices(self, ctx) }

                <main class="main-content">
                    <h1>{"Report waste"}</h1>
                    <div class="report-card">
                        { upload_section::render_upload_section(self, ctx) }
                        { results::render_verification(self, ctx) }
                        { report_form::render_report_form(self, ctx) }
                    </div>

                    <h2>{"Recent Reports"}</h2>
                    { reports_table::render_reports_table(self) }
                </main>

                <footer class="app-footer">
                    <p>{"Community Waste Reporting | Fullstack Rust WASM"}</p>
                </footer>
            </div>
        }
    }
}

fn main() {
    wasm_logger::init(wasm_logger::Config::default());
    log::info!("App starting...");
    yew::Renderer::<Model>::new().render();
}
