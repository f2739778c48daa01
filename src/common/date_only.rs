// src/common/date_only.rs

//! Datas sem horário. Todo o agendamento de cobrança trabalha com `NaiveDate`
//! para não sofrer deslocamento de fuso ao virar o dia.

use chrono::{DateTime, Datelike, Days, FixedOffset, NaiveDate, Utc};

use crate::common::error::AppError;

/// Aceita `AAAA-MM-DD` ou um timestamp ISO completo (usa só a parte da data,
/// sem converter fuso).
pub fn parse_date(input: &str) -> Result<NaiveDate, AppError> {
    let trimmed = input.trim();
    let date_part = trimmed.get(..10).unwrap_or(trimmed);

    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map_err(|_| AppError::InvalidDate(input.to_string()))
}

pub fn to_iso(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Formato usado nas mensagens para o cliente (dd/mm/aaaa).
pub fn to_br(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

pub fn add_days(date: NaiveDate, days: i64) -> NaiveDate {
    let shifted = if days >= 0 {
        date.checked_add_days(Days::new(days as u64))
    } else {
        date.checked_sub_days(Days::new(days.unsigned_abs()))
    };
    shifted.unwrap_or(date)
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first_of_next| first_of_next.pred_opt())
        .map(|last| last.day())
        .unwrap_or(28)
}

/// Dia de cobrança limitado ao último dia do mês (dia 31 em fevereiro vira 28/29).
pub fn clamp_day(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    let effective = day.clamp(1, days_in_month(year, month));
    NaiveDate::from_ymd_opt(year, month, effective)
}

/// Índice absoluto do mês, útil para calcular distância entre meses.
pub fn month_index(date: NaiveDate) -> i64 {
    date.year() as i64 * 12 + date.month0() as i64
}

pub fn same_month(a: NaiveDate, b: NaiveDate) -> bool {
    a.year() == b.year() && a.month() == b.month()
}

/// "Hoje" no fuso de operação da empresa.
pub fn today_at(now: DateTime<Utc>, offset_hours: i32) -> NaiveDate {
    match FixedOffset::east_opt(offset_hours * 3600) {
        Some(offset) => now.with_timezone(&offset).date_naive(),
        None => now.date_naive(),
    }
}
