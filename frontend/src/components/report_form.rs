use shared::VerificationState;
use web_sys::HtmlInputElement;
use yew::prelude::*;

use crate::{Model, Msg, ReportField};

fn field_input(ctx: &Context<Model>, field: ReportField) -> Callback<InputEvent> {
    ctx.link().callback(move |e: InputEvent| {
        let input: HtmlInputElement = e.target_unchecked_into();
        Msg::FieldChanged(field, input.value())
    })
}

pub fn render_report_form(model: &Model, ctx: &Context<Model>) -> Html {
    let on_submit = ctx.link().callback(|e: SubmitEvent| {
        e.prevent_default();
        Msg::SubmitReport
    });
    let can_submit = model.verification_state == VerificationState::Success
        && model.user.is_some()
        && !model.submitting;

    html! {
        <form class="report-form" onsubmit={on_submit}>
            <div class="form-grid">
                <div>
                    <label for="location">{"Location"}</label>
                    <input
                        id="location"
                        type="text"
                        required=true
                        placeholder="Enter waste location"
                        value={model.form.location.clone()}
                        oninput={field_input(ctx, ReportField::Location)}
                    />
                </div>
                <div>
                    <label for="type">{"Waste Type"}</label>
                    <input
                        id="type"
                        type="text"
                        required=true
                        readonly=true
                        placeholder="Verified waste type"
                        value={model.form.waste_type.clone()}
                        oninput={field_input(ctx, ReportField::WasteType)}
                    />
                </div>
                <div>
                    <label for="amount">{"Estimated Amount"}</label>
                    <input
                        id="amount"
                        type="text"
                        required=true
                        readonly=true
                        placeholder="Verified amount"
                        value={model.form.amount.clone()}
                        oninput={field_input(ctx, ReportField::Amount)}
                    />
                </div>
            </div>
            <button type="submit" class="analyze-btn submit-btn" disabled={!can_submit}>
                if model.submitting {
                    <><i class="fa-solid fa-spinner fa-spin"></i>{" Submitting..."}</>
                } else {
                    {"Submit Report"}
                }
            </button>
        </form>
    }
}
