use yew::prelude::*;

use crate::Model;

pub fn render_reports_table(model: &Model) -> Html {
    if model.reports.is_empty() {
        return html! { <p class="no-results-message">{"No reports yet."}</p> };
    }

    html! {
        <div class="reports-table">
            <table>
                <thead>
                    <tr>
                        <th>{"Location"}</th>
                        <th>{"Type"}</th>
                        <th>{"Amount"}</th>
                        <th>{"Date"}</th>
                    </tr>
                </thead>
                <tbody>
                    { for model.reports.iter().map(|report| html! {
                        <tr key={report.id.to_string()}>
                            <td><i class="fa-solid fa-location-dot"></i>{ format!(" {}", report.location) }</td>
                            <td>{ &report.waste_type }</td>
                            <td>{ &report.amount }</td>
                            <td>{ report.created_date() }</td>
                        </tr>
                    })}
                </tbody>
            </table>
        </div>
    }
}
