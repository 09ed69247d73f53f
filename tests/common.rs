use std::cell::RefCell;
use std::rc::Rc;

#[allow(unused)]
pub fn recorder<T: 'static>() -> (Box<dyn Fn(T)>, Box<dyn Fn() -> Vec<T>>) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let record = {
        let seen = seen.clone();
        Box::new(move |value: T| {
            seen.borrow_mut().push(value);
        })
    };

    let drain = Box::new(move || seen.borrow_mut().drain(..).collect::<Vec<T>>());

    (record, drain)
}

/// Yields enough times for every scheduled listener, worker park and deferred
/// batch to run.
#[allow(unused)]
pub async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

#[allow(unused)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}
