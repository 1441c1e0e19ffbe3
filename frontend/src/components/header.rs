use web_sys::HtmlInputElement;
use yew::prelude::*;

use crate::{Model, Msg};

pub fn render_header(model: &Model, ctx: &Context<Model>) -> Html {
    html! {
        <header class="app-header">
            <h1><i class="fa-solid fa-recycle"></i> {" Waste Watch"}</h1>
            { render_search(model, ctx) }
            { render_account(model, ctx) }
        </header>
    }
}

fn render_search(model: &Model, ctx: &Context<Model>) -> Html {
    let on_input = ctx.link().callback(|e: InputEvent| {
        let input: HtmlInputElement = e.target_unchecked_into();
        Msg::SearchChanged(input.value())
    });

    html! {
        <div class="search">
            <input
                type="search"
                placeholder="Search..."
                value={model.search_query.clone()}
                oninput={on_input}
            />
            if !model.search_results.is_empty() {
                <ul class="search-results">
                    { for model.search_results.iter().map(|result| html! {
                        <li key={result.id.clone()}>
                            <a href={result.url.clone()}>{ &result.title }</a>
                        </li>
                    })}
                </ul>
            }
        </div>
    }
}

fn render_account(model: &Model, ctx: &Context<Model>) -> Html {
    let link = ctx.link();

    match &model.user {
        Some(user) => html! {
            <div class="user-info">
                <span class="balance" title="Reward points">
                    <i class="fa-solid fa-coins"></i>{ format!(" {}", user.balance) }
                </span>
                <div class="user-details">
                    <span class="user-name">{ &user.name }</span>
                    <span class="user-email">{ &user.email }</span>
                </div>
                <button class="logout-button" onclick={link.callback(|_| Msg::Logout)} title="Logout">
                    <i class="fa-solid fa-sign-out-alt"></i>{" Logout"}
                </button>
            </div>
        },
        None => {
            let on_email = link.callback(|e: InputEvent| {
                let input: HtmlInputElement = e.target_unchecked_into();
                Msg::LoginEmailChanged(input.value())
            });
            let on_name = link.callback(|e: InputEvent| {
                let input: HtmlInputElement = e.target_unchecked_into();
                Msg::LoginNameChanged(input.value())
            });
            let on_submit = link.callback(|e: SubmitEvent| {
                e.prevent_default();
                Msg::Login
            });

            html! {
                <form class="login-form" onsubmit={on_submit}>
                    <input type="email" placeholder="Email" value={model.login_email.clone()} oninput={on_email} />
                    <input type="text" placeholder="Name (optional)" value={model.login_name.clone()} oninput={on_name} />
                    <button type="submit" class="login-button">
                        <i class="fa-solid fa-right-to-bracket"></i>{" Login"}
                    </button>
                </form>
            }
        }
    }
}
