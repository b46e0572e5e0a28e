// SPDX-License-Identifier: MIT
// Copyright(c) 2024 Darek Stojaczyk

pub mod args;
pub mod bancho;
pub mod geoloc;
pub mod http;
pub mod store;

use log::LevelFilter;

pub fn setup_log(debug: bool, is_test: bool) {
    let timestamp_fmt = match is_test {
        false => Some(env_logger::fmt::TimestampPrecision::Millis),
        true => None,
    };

    let _ = env_logger::Builder::new()
        .filter_level(if debug {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .filter_module("polling", LevelFilter::Info)
        .filter_module("async_io", LevelFilter::Info)
        .parse_default_env()
        .format_timestamp(timestamp_fmt)
        .is_test(is_test)
        .try_init();
}

pub mod executor {
    use futures::Future;
    use smol::{LocalExecutor, Task};

    thread_local! {
        static ASYNC_EX: LocalExecutor<'static> = LocalExecutor::new();
    }

    pub fn spawn_local<F: Future<Output = T> + 'static, T: 'static>(future: F) -> Task<T> {
        // SAFETY: the executor lives in a thread local and is never
        // dropped before the thread itself terminates
        let ex: &'static LocalExecutor = ASYNC_EX.with(|ex| unsafe { std::mem::transmute(ex) });
        ex.spawn(future)
    }

    pub fn run_until<F: Future<Output = T> + 'static, T: 'static>(future: F) -> T {
        // SAFETY: as above
        let ex: &'static LocalExecutor = ASYNC_EX.with(|ex| unsafe { std::mem::transmute(ex) });
        futures::executor::block_on(ex.run(future))
    }
}
