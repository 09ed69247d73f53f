use std::rc::Rc;

/// Callback invoked with each emitted payload.
pub type Listener<T> = Rc<dyn Fn(T)>;

/// Trait for types that can be connected to a signal as listeners.
pub trait IntoListener<T> {
    fn into_listener(self) -> Listener<T>;
}

impl<F, T> IntoListener<T> for F
where F: Fn(T) + 'static
{
    fn into_listener(self) -> Listener<T> { Rc::new(self) }
}

// Implementation for Listener itself
impl<T> IntoListener<T> for Listener<T> {
    fn into_listener(self) -> Listener<T> { self }
}

// Channel senders connect directly as listeners; send errors are ignored
// because a dropped receiver just means nobody is consuming anymore.
impl<T: 'static> IntoListener<T> for tokio::sync::mpsc::UnboundedSender<T> {
    fn into_listener(self) -> Listener<T> {
        Rc::new(move |payload| {
            let _ = self.send(payload);
        })
    }
}

impl<T: 'static> IntoListener<T> for std::sync::mpsc::Sender<T> {
    fn into_listener(self) -> Listener<T> {
        Rc::new(move |payload| {
            let _ = self.send(payload);
        })
    }
}
