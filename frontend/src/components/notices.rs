use yew::prelude::*;

use super::utils::{notice_class, notice_icon};
use crate::{Model, Msg};

pub fn render_notices(model: &Model, ctx: &Context<Model>) -> Html {
    if model.toasts.is_empty() {
        return html! {};
    }

    html! {
        <div class="toasts">
            { for model.toasts.iter().map(|toast| {
                let id = toast.id;
                html! {
                    <div
                        key={id.to_string()}
                        class={classes!("toast", notice_class(toast.notice.level))}
                        onclick={ctx.link().callback(move |_| Msg::DismissNotice(id))}
                    >
                        <i class={notice_icon(toast.notice.level)}></i>
                        <p>{ &toast.notice.message }</p>
                    </div>
                }
            })}
        </div>
    }
}
