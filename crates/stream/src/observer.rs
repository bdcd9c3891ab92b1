use glam::Vec3;

/// Supplies the point distances are measured from.
///
/// `None` means the observer is unavailable (not spawned yet, dead, between
/// levels); passes are skipped rather than failed.
pub trait ObserverSource {
    fn observer_position(&self) -> Option<Vec3>;
}

impl ObserverSource for Vec3 {
    fn observer_position(&self) -> Option<Vec3> {
        Some(*self)
    }
}

impl ObserverSource for Option<Vec3> {
    fn observer_position(&self) -> Option<Vec3> {
        *self
    }
}

impl<T: ObserverSource + ?Sized> ObserverSource for &T {
    fn observer_position(&self) -> Option<Vec3> {
        (**self).observer_position()
    }
}

/// Adapts a closure into an [`ObserverSource`].
#[derive(Debug, Clone, Copy)]
pub struct ObserverFn<F>(pub F);

impl<F: Fn() -> Option<Vec3>> ObserverSource for ObserverFn<F> {
    fn observer_position(&self) -> Option<Vec3> {
        (self.0)()
    }
}

/// Position reported by `source`, if any and finite.
pub(crate) fn sample(source: &(impl ObserverSource + ?Sized)) -> Option<Vec3> {
    source.observer_position().filter(|p| p.is_finite())
}
