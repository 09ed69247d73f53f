/*!
A minimal publish/subscribe primitive.

A [`Signal`] is a single emission point with any number of independently
revocable listeners. Listeners are invoked through a [`Scheduler`] handle,
never inline with the firing call, on one of two timings: immediate
([`Signal::fire`], as soon as the executor is free) or deferred
([`Signal::fire_deferred`], batched on the next scheduling tick). A consumer
can also park until the next emission with [`Signal::wait`].

# Design requirements:
- Single-logical-thread cooperative: `Rc`-based state, no locks, callbacks
  without `Send`/`Sync` bounds. Everything runs on a current-thread tokio
  runtime inside a `LocalSet`.
- Firing never re-enters the caller's stack; code after `fire` runs before any
  listener body does.
- Disconnecting a listener - from outside or from inside a dispatch in
  progress - must never perturb delivery to the other listeners of that
  dispatch.
- The scheduler is an explicit handle injected into every signal, not process
  global state.

# Basic usage

```rust,no_run
use pulse::{Scheduler, Signal};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let scheduler = Scheduler::new();
            let signal: Signal<i32> = Signal::new(&scheduler);

            let connection = signal.connect(|value: i32| println!("got {value}"));
            signal.fire(5);

            // runs before any listener body
            println!("fired");

            tokio::task::yield_now().await;
            connection.disconnect();
        })
        .await;
}
```
*/

mod connection;
mod listener;
mod scheduler;
mod signal;

pub use connection::*;
pub use listener::*;
pub use scheduler::*;
pub use signal::*;
