use super::utils::{debounce, first_image_file};
use shared::{Notice, VerificationState};
use wasm_bindgen::JsCast;
use web_sys::{DragEvent, HtmlInputElement};
use yew::prelude::*;

use crate::{Model, Msg};

pub fn render_upload_section(model: &Model, ctx: &Context<Model>) -> Html {
    html! {
        <div class="upload-section">
            <label for="waste-image">{"Upload Waste Image"}</label>
            { render_file_input_area(model, ctx) }
            { render_preview(model) }
        </div>
    }
}

fn render_file_input_area(model: &Model, ctx: &Context<Model>) -> Html {
    let link = ctx.link();
    let handle_change = link.callback(|e: Event| {
        let input: HtmlInputElement = e.target_unchecked_into();
        let file = input.files().as_ref().and_then(first_image_file);

        input.set_value("");

        match file {
            Some(file) => Msg::ImageSelected(file),
            None => Msg::Notify(Notice::error("No valid image file selected.")),
        }
    });

    let handle_drag_over = link.callback(|e: DragEvent| {
        e.prevent_default();
        Msg::SetDragging(true)
    });

    let handle_drag_leave = link.callback(|e: DragEvent| {
        e.prevent_default();
        Msg::SetDragging(false)
    });

    let handle_drop = link.callback(Msg::HandleDrop);
    let trigger_file_input = Callback::from(|_| {
        if let Some(input) = web_sys::window()
            .and_then(|window| window.document())
            .and_then(|document| document.get_element_by_id("waste-image"))
        {
            if let Ok(html_input) = input.dyn_into::<web_sys::HtmlElement>() {
                html_input.click();
            }
        }
    });
    let locked = model.verification_state == VerificationState::Verifying;

    html! {
        <>
            <input
                type="file"
                id="waste-image"
                accept="image/*"
                style="display: none;"
                disabled={locked}
                onchange={handle_change}
            />

            <div
                id="drop-zone"
                class={classes!("upload-area", model.is_dragging.then_some("drag-over"))}
                ondragover={handle_drag_over}
                ondragleave={handle_drag_leave}
                ondrop={handle_drop}
                onclick={debounce(300, {
                    let trigger_file_input = trigger_file_input.clone();
                    move || trigger_file_input.emit(())
                })}
            >
                <div class="upload-placeholder">
                    <i class="fa-solid fa-cloud-arrow-up"></i>
                    <p>{"Upload a file or drag and drop"}</p>
                    <p class="file-types">{"PNG, JPG, GIF up to 10MB"}</p>
                </div>
            </div>
        </>
    }
}

fn render_preview(model: &Model) -> Html {
    match (&model.preview_url, &model.file) {
        (Some(url), Some(file)) => html! {
            <div class="preview">
                <img src={url.to_string()} alt="Waste preview" />
                <p class="preview-name">{ file.name() }</p>
            </div>
        },
        _ => html! {},
    }
}
