use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::dates::normalize_str;
use crate::error::{ReportError, Result};
use crate::models::{
    parse_amount, parse_percent, CellValue, MerchantPercents, Row, MERCHANT_NAME, WITHDRAWAL_AMOUNT,
    WITHDRAWAL_FEES,
};

pub const GRAND_TOTAL_LABEL: &str = "Grand Total";
pub const TOTAL_PERCENT_AMOUNT: &str = "Total Percent Amount";
pub const TOTAL_WITHDRAWAL: &str = "Total Withdrawal Amount";
pub const TOTAL_FEES: &str = "Total Withdrawal Fees";
pub const PERCENT: &str = "Percent";

/// Whether the details sheet carries per-transaction rows with subtotals, or
/// just the date-filtered source rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportMode {
    #[default]
    Detailed,
    Summary,
}

impl FromStr for ReportMode {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "detailed" => Ok(Self::Detailed),
            "summary" => Ok(Self::Summary),
            other => Err(ReportError::Settings(format!(
                "unknown report mode '{other}' (expected detailed or summary)"
            ))),
        }
    }
}

impl fmt::Display for ReportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Detailed => "detailed",
            Self::Summary => "summary",
        })
    }
}

/// Column holding a merchant's percent amount, e.g. `2.5% Amount`.
pub fn percent_column(percent: f64) -> String {
    format!("{percent}% Amount")
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct MerchantTotals {
    pub merchant: String,
    pub percent: f64,
    pub transactions: usize,
    pub total_withdrawal: f64,
    pub total_fees: f64,
    pub total_percent_amount: f64,
}

impl MerchantTotals {
    fn is_finite(&self) -> bool {
        self.total_withdrawal.is_finite()
            && self.total_fees.is_finite()
            && self.total_percent_amount.is_finite()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GrandTotals {
    pub total_withdrawal: f64,
    pub total_fees: f64,
    pub total_percent_amount: f64,
}

#[derive(Debug, Clone)]
pub struct Report {
    pub start_date: String,
    pub end_date: String,
    pub mode: ReportMode,
    /// Rows whose `DateOnly` fell inside the range, before merchant matching.
    pub rows_in_range: usize,
    pub detail_rows: Vec<Row>,
    pub summary_rows: Vec<Row>,
    pub merchants: Vec<MerchantTotals>,
    pub grand_totals: GrandTotals,
}

/// Normalizes both bounds and rejects an inverted range.
pub fn date_range(start: &str, end: &str) -> Result<(String, String)> {
    let s = normalize_str(start);
    if s.is_empty() {
        return Err(ReportError::InvalidDateRange(format!(
            "start date '{start}' is not a recognizable date"
        )));
    }
    let e = normalize_str(end);
    if e.is_empty() {
        return Err(ReportError::InvalidDateRange(format!(
            "end date '{end}' is not a recognizable date"
        )));
    }
    // Zero-padded YYYY-MM-DD compares lexically in calendar order.
    if s > e {
        return Err(ReportError::InvalidDateRange(format!(
            "start date {s} is after end date {e}"
        )));
    }
    Ok((s, e))
}

/// Filters a dataset to the date range and computes per-merchant percentage
/// totals plus a grand total.
///
/// Merchants are visited in request order. A merchant whose percentage is not
/// a finite number, or that has no rows in range, is left out of the output.
pub fn generate(
    dataset: &[Row],
    start: &str,
    end: &str,
    percents: &MerchantPercents,
    mode: ReportMode,
) -> Result<Report> {
    let (start_date, end_date) = date_range(start, end)?;

    let in_range: Vec<&Row> = dataset
        .iter()
        .filter(|r| {
            let day = r.date_only();
            !day.is_empty() && day >= start_date.as_str() && day <= end_date.as_str()
        })
        .collect();
    if in_range.is_empty() {
        return Err(ReportError::NoDataInRange(start_date, end_date));
    }

    let mut detail_rows = Vec::new();
    let mut summary_rows = Vec::new();
    let mut merchants = Vec::new();

    for (merchant, raw_percent) in percents.iter() {
        let Some(percent) = parse_percent(raw_percent) else {
            tracing::debug!(merchant, raw_percent, "skipping non-numeric percentage");
            continue;
        };
        let matching: Vec<&Row> = in_range
            .iter()
            .copied()
            .filter(|r| r.merchant() == Some(merchant))
            .collect();
        if matching.is_empty() {
            continue;
        }

        let column = percent_column(percent);
        let mut totals = MerchantTotals {
            merchant: merchant.to_string(),
            percent,
            transactions: matching.len(),
            total_withdrawal: 0.0,
            total_fees: 0.0,
            total_percent_amount: 0.0,
        };

        let mut merchant_rows = Vec::with_capacity(matching.len());
        for row in matching {
            let withdrawal = parse_amount(row.get(WITHDRAWAL_AMOUNT));
            let fee = parse_amount(row.get(WITHDRAWAL_FEES));
            let percent_amount = withdrawal * percent / 100.0;
            totals.total_withdrawal += withdrawal;
            totals.total_fees += fee;
            totals.total_percent_amount += percent_amount;

            if mode == ReportMode::Detailed {
                merchant_rows.push(row.clone().with(column.as_str(), CellValue::Amount(percent_amount)));
            }
        }
        if !totals.is_finite() {
            tracing::debug!(merchant, raw_percent, "skipping percentage whose totals overflow");
            continue;
        }
        detail_rows.append(&mut merchant_rows);

        if mode == ReportMode::Detailed {
            detail_rows.push(
                Row::new()
                    .with(MERCHANT_NAME, format!("{merchant} Total"))
                    .with(WITHDRAWAL_AMOUNT, CellValue::Amount(totals.total_withdrawal))
                    .with(WITHDRAWAL_FEES, CellValue::Amount(totals.total_fees))
                    .with(column.as_str(), CellValue::Amount(totals.total_percent_amount)),
            );
        }
        summary_rows.push(
            Row::new()
                .with(MERCHANT_NAME, merchant)
                .with(PERCENT, percent)
                .with(TOTAL_WITHDRAWAL, CellValue::Amount(totals.total_withdrawal))
                .with(TOTAL_FEES, CellValue::Amount(totals.total_fees))
                .with(column, CellValue::Amount(totals.total_percent_amount)),
        );
        merchants.push(totals);
    }

    if merchants.is_empty() {
        return Err(ReportError::NoMatchingMerchantData);
    }

    let grand_totals = merchants.iter().fold(GrandTotals::default(), |mut acc, m| {
        acc.total_withdrawal += m.total_withdrawal;
        acc.total_fees += m.total_fees;
        acc.total_percent_amount += m.total_percent_amount;
        acc
    });

    summary_rows.push(
        Row::new()
            .with(MERCHANT_NAME, GRAND_TOTAL_LABEL)
            .with(TOTAL_WITHDRAWAL, CellValue::Amount(grand_totals.total_withdrawal))
            .with(TOTAL_FEES, CellValue::Amount(grand_totals.total_fees))
            .with(TOTAL_PERCENT_AMOUNT, CellValue::Amount(grand_totals.total_percent_amount)),
    );

    match mode {
        ReportMode::Detailed => detail_rows.push(
            Row::new()
                .with(MERCHANT_NAME, GRAND_TOTAL_LABEL)
                .with(WITHDRAWAL_AMOUNT, CellValue::Amount(grand_totals.total_withdrawal))
                .with(WITHDRAWAL_FEES, CellValue::Amount(grand_totals.total_fees))
                .with(TOTAL_PERCENT_AMOUNT, CellValue::Amount(grand_totals.total_percent_amount)),
        ),
        ReportMode::Summary => detail_rows = in_range.iter().map(|r| (*r).clone()).collect(),
    }

    Ok(Report {
        start_date,
        end_date,
        mode,
        rows_in_range: in_range.len(),
        detail_rows,
        summary_rows,
        merchants,
        grand_totals,
    })
}
