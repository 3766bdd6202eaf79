//! スライスを走査しながら定期的に進捗を通知するモニター

use std::iter::FusedIterator;

use crate::traits::StatusReporter;

/// [`Monitor`] の通知間隔
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Period {
    /// 全要素で通知
    #[default]
    Every,
    /// n要素ごとに通知（0始まりのインデックス）
    Count(usize),
    /// 全体の `f` 割合ごとに通知。`f` は (0, 1] の範囲
    Fraction(f64),
}

impl Period {
    /// 要素数 `total` に対する整数の通知間隔。`None` は全要素で通知
    ///
    /// `Count(0)` は 1 として扱う。`Fraction` は (0, 1] の範囲でなければならない。
    pub fn resolve(self, total: usize) -> Option<usize> {
        match self {
            Self::Every => None,
            Self::Count(n) => Some(n.max(1)),
            Self::Fraction(f) => {
                debug_assert!(f > 0.0 && f <= 1.0, "period fraction {f} outside (0, 1]");
                Some(((f * total as f64).floor() as usize).max(1))
            }
        }
    }
}

/// `items` の走査をジョブ進捗の `start..end` の範囲に割り当て、
/// 要素を返す直前に `reporter` へ通知する
pub struct Monitor<'a, T, R: ?Sized> {
    reporter: &'a R,
    items: &'a [T],
    start: i32,
    end: i32,
    period: Option<usize>,
    prefix: Option<String>,
}

impl<'a, T, R: StatusReporter + ?Sized> Monitor<'a, T, R> {
    /// `end` は `start` より大きくなければならない。
    pub fn new(reporter: &'a R, items: &'a [T], start: i32, end: i32) -> Self {
        debug_assert!(end > start, "progress range {start}..{end} is empty");
        Self {
            reporter,
            items,
            start,
            end,
            period: None,
            prefix: None,
        }
    }

    pub fn with_period(mut self, period: Period) -> Self {
        self.period = period.resolve(self.items.len());
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub const fn period(&self) -> Option<usize> {
        self.period
    }

    /// `index` 番目の進捗値（0方向へ切り捨て）
    pub fn relative_progress(&self, index: usize) -> i32 {
        let ratio = index as f64 / self.items.len() as f64;
        (f64::from(self.start) + f64::from(self.end - self.start) * ratio) as i32
    }

    pub fn status_comment(&self, index: usize) -> String {
        let counter = format!("({}/{}).", index + 1, self.items.len());
        match &self.prefix {
            Some(prefix) => format!("{prefix} {counter}"),
            None => counter,
        }
    }

    fn should_report(&self, index: usize) -> bool {
        self.period.map_or(true, |period| index % period == 0)
    }
}

impl<'a, T, R: StatusReporter + ?Sized> IntoIterator for Monitor<'a, T, R> {
    type Item = &'a T;
    type IntoIter = MonitorIter<'a, T, R>;

    fn into_iter(self) -> Self::IntoIter {
        MonitorIter {
            monitor: self,
            index: 0,
        }
    }
}

pub struct MonitorIter<'a, T, R: ?Sized> {
    monitor: Monitor<'a, T, R>,
    index: usize,
}

impl<'a, T, R: StatusReporter + ?Sized> Iterator for MonitorIter<'a, T, R> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.monitor.items.get(self.index)?;
        if self.monitor.should_report(self.index) {
            let comment = self.monitor.status_comment(self.index);
            let progress = self.monitor.relative_progress(self.index);
            self.monitor.reporter.update(progress, &comment);
        }
        self.index += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.monitor.items.len() - self.index;
        (remaining, Some(remaining))
    }
}

impl<T, R: StatusReporter + ?Sized> ExactSizeIterator for MonitorIter<'_, T, R> {}

impl<T, R: StatusReporter + ?Sized> FusedIterator for MonitorIter<'_, T, R> {}
