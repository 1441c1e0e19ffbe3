use shared::VerificationState;
use yew::prelude::*;

use super::utils::debounce;
use crate::{Model, Msg};

pub fn render_verification(model: &Model, ctx: &Context<Model>) -> Html {
    html! {
        <>
            { render_verify_button(model, ctx) }
            { render_outcome(model, ctx) }
        </>
    }
}

fn render_verify_button(model: &Model, ctx: &Context<Model>) -> Html {
    let verifying = model.verification_state == VerificationState::Verifying;
    let link = ctx.link().clone();

    html! {
        <button
            type="button"
            class="analyze-btn verify-btn"
            disabled={model.file.is_none() || verifying}
            onclick={debounce(300, move || link.send_message(Msg::Verify))}
        >
            if verifying {
                <><i class="fa-solid fa-spinner fa-spin"></i>{" Verifying..."}</>
            } else {
                <><i class="fa-solid fa-magnifying-glass"></i>{" Verify Waste"}</>
            }
        </button>
    }
}

fn render_outcome(model: &Model, ctx: &Context<Model>) -> Html {
    match (model.verification_state, &model.verification) {
        (VerificationState::Success, Some(result)) => html! {
            <div class="results-container verified">
                <i class="fa-solid fa-circle-check"></i>
                <div>
                    <h3>{"Verification Successful"}</h3>
                    <p>{ format!("Waste Type: {}", result.waste_type) }</p>
                    <p>{ format!("Quantity: {}", result.quantity) }</p>
                    <p>{ format!("Confidence: {}", result.confidence_percent()) }</p>
                </div>
            </div>
        },
        (VerificationState::Failure, _) => html! {
            <div class="results-container failed">
                <button
                    type="button"
                    class="analyze-btn retry-btn"
                    onclick={ctx.link().callback(|_| Msg::Verify)}
                >
                    {"Retry Verification"}
                </button>
                <p class="tip">{"Tip: Try with a clearer image or different lighting"}</p>
            </div>
        },
        _ => html! {},
    }
}
