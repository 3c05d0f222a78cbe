//! Internal testing utilities for the rten-prob crates.

use std::fmt::Debug;
use std::panic::{RefUnwindSafe, UnwindSafe};

mod close;
mod stats;

pub use close::{AllCloseError, expect_all_close, expect_all_close_with_tolerance};
pub use stats::{SampleMoments, all_finite, all_nan, sample_moments};

/// Utility for creating parametrized (aka. table-driven) tests.
///
/// To create a table driven test:
///
/// 1. Import the `TestCases` trait
/// 2. Create a struct, conventionally named `Case`, that contains the data
///    for a single test case. This struct must implement `Debug`.
/// 3. Create a collection of `Case` instances (eg. an array or Vec),
///    conventionally named `cases`.
/// 4. Call `cases.test_each`, passing the test function as a closure
///
/// `test_each` runs every case and catches panics, so that one failing case
/// does not hide the others. If any case panicked it then panics itself with
/// the count and debug representations of the failing cases.
///
/// ## Example
///
/// ```
/// use rten_testing::TestCases;
///
/// // Add #[test] attribute
/// fn test_batch_size() {
///   #[derive(Debug)]
///   struct Case<'a> {
///     shape: &'a [usize],
///     expected: usize,
///   }
///
///   let cases = [
///     Case { shape: &[], expected: 1 },
///     Case { shape: &[2, 3], expected: 6 },
///   ];
///
///   cases.test_each(|case| {
///     assert_eq!(case.shape.iter().product::<usize>(), case.expected);
///   });
/// }
/// # test_batch_size();
/// ```
///
/// ## Unwind safety
///
/// Test cases and the test function must be
/// [unwind safe](https://doc.rust-lang.org/std/panic/fn.catch_unwind.html).
/// Types with interior mutability such as `Cell` are not. Wrap captured
/// values of such types with [`AssertUnwindSafe`](std::panic::AssertUnwindSafe).
pub trait TestCases {
    /// The data for a single test case.
    type Case;

    /// Call test function `test` with each test case in `self`, catching any panics.
    ///
    /// After all cases have been evaluated, return if no panics occurred or
    /// panic with details of failing cases otherwise.
    fn test_each(self, test: impl Fn(&Self::Case) + RefUnwindSafe)
    where
        Self::Case: Debug + RefUnwindSafe;

    /// Variant of [`test_each`](TestCases::test_each) which passes test cases
    /// to the test function by value.
    ///
    /// Each case is formatted before the test function is called, so that it
    /// can be reported if the function panics.
    fn test_each_value(self, test: impl Fn(Self::Case) + RefUnwindSafe)
    where
        Self::Case: Debug + UnwindSafe;
}

impl<I: IntoIterator> TestCases for I {
    type Case = I::Item;

    fn test_each(self, test: impl Fn(&I::Item) + RefUnwindSafe)
    where
        Self::Case: Debug + RefUnwindSafe,
    {
        let failures: Vec<_> = self
            .into_iter()
            .filter(|case| std::panic::catch_unwind(|| test(case)).is_err())
            .collect();
        report_failures(&failures);
    }

    fn test_each_value(self, test: impl Fn(I::Item) + RefUnwindSafe)
    where
        Self::Case: Debug + UnwindSafe,
    {
        let test = &test;
        let failures: Vec<String> = self
            .into_iter()
            .filter_map(|case| {
                let case_str = format!("{:?}", case);
                std::panic::catch_unwind(move || test(case))
                    .is_err()
                    .then_some(case_str)
            })
            .collect();
        report_failures(&failures);
    }
}

fn report_failures<T: Debug>(failures: &[T]) {
    assert_eq!(
        failures.len(),
        0,
        "{} test cases failed: {:?}",
        failures.len(),
        failures
    );
}
