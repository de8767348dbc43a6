/// One step of a multi-shot source: an element, or the end of the sequence.
///
/// Unlike `Option`, exhaustion stays unambiguous when the element type is
/// itself optional.
///
/// # Examples
///
/// ```rust
/// use cont_bridge::Iteration;
///
/// let present: Iteration<Option<u8>> = Iteration::Present(None);
/// let exhausted: Iteration<Option<u8>> = Iteration::Exhausted;
///
/// assert!(bool::from(&present));
/// assert!(!bool::from(&exhausted));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Iteration<T> {
    /// The source delivered an element
    Present(T),
    /// The source delivered its terminal empty marker
    Exhausted,
}

impl<T> Iteration<T> {
    /// Returns `true` if the step holds an element.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cont_bridge::Iteration;
    ///
    /// assert!(Iteration::Present(1).is_present());
    /// assert!(!Iteration::<i32>::Exhausted.is_present());
    /// ```
    #[inline]
    pub const fn is_present(&self) -> bool {
        matches!(self, Iteration::Present(_))
    }

    /// Returns `true` if the source has finished.
    #[inline]
    pub const fn is_exhausted(&self) -> bool {
        matches!(self, Iteration::Exhausted)
    }

    /// Converts from `Iteration<T>` to `Option<T>`, discarding the distinction
    /// between an exhausted source and a missing element.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cont_bridge::Iteration;
    ///
    /// assert_eq!(Iteration::Present(3).present_value(), Some(3));
    /// assert_eq!(Iteration::<i32>::Exhausted.present_value(), None);
    /// ```
    #[inline]
    pub fn present_value(self) -> Option<T> {
        match self {
            Iteration::Present(t) => Some(t),
            Iteration::Exhausted => None,
        }
    }

    /// Alias of [`present_value`](Self::present_value) for use in `Option` chains.
    #[inline]
    pub fn into_option(self) -> Option<T> {
        self.present_value()
    }

    /// Maps an `Iteration<T>` to `Iteration<U>` by applying a function to the element.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cont_bridge::Iteration;
    ///
    /// assert_eq!(Iteration::Present(21).map(|x| x * 2), Iteration::Present(42));
    /// assert_eq!(Iteration::<i32>::Exhausted.map(|x| x * 2), Iteration::Exhausted);
    /// ```
    #[inline]
    pub fn map<U, F>(self, f: F) -> Iteration<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Iteration::Present(t) => Iteration::Present(f(t)),
            Iteration::Exhausted => Iteration::Exhausted,
        }
    }

    /// Converts from `&Iteration<T>` to `Iteration<&T>`.
    #[inline]
    pub const fn as_ref(&self) -> Iteration<&T> {
        match self {
            Iteration::Present(t) => Iteration::Present(t),
            Iteration::Exhausted => Iteration::Exhausted,
        }
    }

    /// Converts from `&mut Iteration<T>` to `Iteration<&mut T>`.
    #[inline]
    pub fn as_mut(&mut self) -> Iteration<&mut T> {
        match self {
            Iteration::Present(t) => Iteration::Present(t),
            Iteration::Exhausted => Iteration::Exhausted,
        }
    }

    /// Returns the element, or `default` if the source is exhausted.
    #[inline]
    pub fn present_or(self, default: T) -> T {
        match self {
            Iteration::Present(t) => t,
            Iteration::Exhausted => default,
        }
    }

    /// Returns the contained element, consuming the `self` value.
    ///
    /// # Panics
    ///
    /// Panics if the source is exhausted, with a custom panic message provided by `msg`.
    #[inline]
    pub fn expect_present(self, msg: &str) -> T {
        match self {
            Iteration::Present(t) => t,
            Iteration::Exhausted => panic!("{}", msg),
        }
    }

    /// Returns the contained element, consuming the `self` value.
    ///
    /// # Panics
    ///
    /// Panics if the source is exhausted.
    #[inline]
    pub fn unwrap_present(self) -> T {
        match self {
            Iteration::Present(t) => t,
            Iteration::Exhausted => {
                panic!("called `Iteration::unwrap_present()` on an `Exhausted` value")
            }
        }
    }
}

impl<T> Default for Iteration<T> {
    fn default() -> Self {
        Iteration::Exhausted
    }
}

impl<T> From<&Iteration<T>> for bool {
    fn from(iteration: &Iteration<T>) -> bool {
        iteration.is_present()
    }
}

impl<T> From<Iteration<T>> for bool {
    fn from(iteration: Iteration<T>) -> bool {
        iteration.is_present()
    }
}

impl<T> IntoIterator for Iteration<T> {
    type Item = T;
    type IntoIter = std::option::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.present_value().into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_present_and_is_exhausted() {
        let p: Iteration<i32> = Iteration::Present(0);
        let e: Iteration<i32> = Iteration::Exhausted;

        assert!(p.is_present());
        assert!(!p.is_exhausted());
        assert!(e.is_exhausted());
        assert!(!e.is_present());
    }

    #[test]
    fn test_bool_conversion_only_true_for_present() {
        // a present `None` is still an element
        assert!(bool::from(Iteration::Present(None::<u8>)));
        assert!(bool::from(&Iteration::Present(false)));
        assert!(!bool::from(Iteration::<bool>::Exhausted));
    }

    #[test]
    fn test_default_is_exhausted() {
        assert_eq!(Iteration::<String>::default(), Iteration::Exhausted);
    }

    #[test]
    fn test_map_and_present_or() {
        assert_eq!(Iteration::Present(2).map(|x| x + 1).present_or(0), 3);
        assert_eq!(Iteration::<i32>::Exhausted.map(|x| x + 1).present_or(0), 0);
    }

    #[test]
    fn test_as_mut() {
        let mut p = Iteration::Present(String::from("a"));
        if let Iteration::Present(s) = p.as_mut() {
            s.push('b');
        }
        assert_eq!(p.as_ref(), Iteration::Present(&String::from("ab")));
    }

    #[test]
    fn test_into_iter_yields_at_most_one() {
        assert_eq!(Iteration::Present(5).into_iter().collect::<Vec<_>>(), vec![5]);
        assert!(Iteration::<i32>::Exhausted.into_iter().next().is_none());
    }

    #[test]
    fn test_expect_present() {
        assert_eq!(Iteration::Present(9).expect_present("should be present"), 9);
    }

    #[test]
    #[should_panic(expected = "should be present")]
    fn test_expect_present_panics() {
        Iteration::<i32>::Exhausted.expect_present("should be present");
    }

    #[test]
    #[should_panic(expected = "called `Iteration::unwrap_present()` on an `Exhausted` value")]
    fn test_unwrap_present_panics() {
        Iteration::<i32>::Exhausted.unwrap_present();
    }
}
