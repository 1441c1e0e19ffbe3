use gloo_file::File as GlooFile;
use gloo_timers::callback::Timeout;
use js_sys::Date;
use shared::NoticeLevel;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use web_sys::FileList;
use yew::prelude::*;

pub fn generate_id() -> u64 {
    static ID_COUNTER: AtomicU64 = AtomicU64::new(0);
    let now = Date::now() as u64;
    let count = ID_COUNTER.fetch_add(1, Ordering::SeqCst);
    now * 1000 + (count % 1000)
}

// Debounce function to limit button events
pub fn debounce<F>(duration: i32, callback: F) -> Callback<MouseEvent>
where
    F: Fn() + Clone + 'static,
{
    let timeout = Rc::new(RefCell::new(None::<Timeout>));
    let timeout_clone = Rc::clone(&timeout);

    Callback::from(move |_| {
        let mut timeout_ref = timeout_clone.borrow_mut();

        if let Some(old_timeout) = timeout_ref.take() {
            old_timeout.cancel();
        }

        let inner_callback = callback.clone();
        let new_timeout = Timeout::new(duration as u32, move || {
            inner_callback();
        });

        *timeout_ref = Some(new_timeout);
    })
}

pub fn first_image_file(file_list: &FileList) -> Option<GlooFile> {
    (0..file_list.length())
        .filter_map(|i| file_list.item(i))
        .find(|file| file.type_().starts_with("image/"))
        .map(GlooFile::from)
}

pub fn notice_class(level: NoticeLevel) -> &'static str {
    match level {
        NoticeLevel::Info => "toast-info",
        NoticeLevel::Loading => "toast-loading",
        NoticeLevel::Success => "toast-success",
        NoticeLevel::Warning => "toast-warning",
        NoticeLevel::Error => "toast-error",
    }
}

pub fn notice_icon(level: NoticeLevel) -> &'static str {
    match level {
        NoticeLevel::Info => "fa-solid fa-circle-info",
        NoticeLevel::Loading => "fa-solid fa-spinner fa-spin",
        NoticeLevel::Success => "fa-solid fa-circle-check",
        NoticeLevel::Warning => "fa-solid fa-triangle-exclamation",
        NoticeLevel::Error => "fa-solid fa-circle-exclamation",
    }
}
