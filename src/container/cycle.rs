//! Per-thread resolution path, used to turn dependency cycles into errors
//! instead of unbounded recursion.

use std::cell::RefCell;
use std::marker::PhantomData;

use crate::error::{Error, Result};

thread_local! {
    static PATH: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

/// Marks `id` as being resolved on this thread until the guard drops.
pub(crate) fn enter(id: &str) -> Result<Guard> {
    PATH.with(|path| {
        let mut path = path.borrow_mut();

        if let Some(start) = path.iter().position(|seen| seen == id) {
            let mut chain: Vec<&str> = path[start..].iter().map(String::as_str).collect();
            chain.push(id);
            return Err(Error::resolution(id, format!("circular dependency: {}", chain.join(" -> "))));
        }

        path.push(id.to_owned());
        Ok(Guard { _not_send: PhantomData })
    })
}

/// Pops the current identifier on drop, including on early return.
#[must_use]
pub(crate) struct Guard {
    _not_send: PhantomData<*const ()>,
}

impl Drop for Guard {
    fn drop(&mut self) {
        PATH.with(|path| {
            path.borrow_mut().pop();
        });
    }
}
