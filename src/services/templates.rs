// src/services/templates.rs

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::{common::date_only, models::notification::NotificationKind};

/// Variante de mensagem. As `*Gateway` trazem o Pix Copia e Cola.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    Pre,
    PreGateway,
    Due,
    DueGateway,
    Late,
    LateGateway,
    Paid,
}

impl TemplateKind {
    /// Escolhe a variante de lembrete conforme exista ou não link de pagamento.
    /// `Manual` não tem texto próprio: quem chama decide pelo vencimento.
    pub fn for_reminder(kind: NotificationKind, has_payment_link: bool) -> Self {
        match (kind, has_payment_link) {
            (NotificationKind::Pre, false) => TemplateKind::Pre,
            (NotificationKind::Pre, true) => TemplateKind::PreGateway,
            (NotificationKind::Late, false) => TemplateKind::Late,
            (NotificationKind::Late, true) => TemplateKind::LateGateway,
            (NotificationKind::Paid, _) => TemplateKind::Paid,
            (_, false) => TemplateKind::Due,
            (_, true) => TemplateKind::DueGateway,
        }
    }

    /// Para disparo manual: antes do vencimento é `pre`, no dia é `due`,
    /// depois é `late`.
    pub fn for_manual(due_date: NaiveDate, today: NaiveDate, has_payment_link: bool) -> Self {
        let kind = if due_date > today {
            NotificationKind::Pre
        } else if due_date == today {
            NotificationKind::Due
        } else {
            NotificationKind::Late
        };
        Self::for_reminder(kind, has_payment_link)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TemplateKind::Pre => "pre",
            TemplateKind::PreGateway => "pre_gateway",
            TemplateKind::Due => "due",
            TemplateKind::DueGateway => "due_gateway",
            TemplateKind::Late => "late",
            TemplateKind::LateGateway => "late_gateway",
            TemplateKind::Paid => "paid",
        }
    }
}

#[derive(Debug, Clone)]
pub struct TemplateContext {
    pub client_name: String,
    pub company_name: String,
    pub description: String,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub pix_key: Option<String>,
    pub copy_paste: Option<String>,
    pub paid_on: Option<NaiveDate>,
}

pub fn render(kind: TemplateKind, ctx: &TemplateContext) -> String {
    let amount = format_brl(ctx.amount);
    let due = date_only::to_br(ctx.due_date);

    let mut text = match kind {
        TemplateKind::Pre | TemplateKind::PreGateway => format!(
            "Olá, {}! Lembrete da {}: a cobrança \"{}\" no valor de {} vence em {}.",
            ctx.client_name, ctx.company_name, ctx.description, amount, due
        ),
        TemplateKind::Due | TemplateKind::DueGateway => format!(
            "Olá, {}! A cobrança \"{}\" da {} no valor de {} vence hoje ({}).",
            ctx.client_name, ctx.description, ctx.company_name, amount, due
        ),
        TemplateKind::Late | TemplateKind::LateGateway => format!(
            "Olá, {}! Não identificamos o pagamento da cobrança \"{}\" da {} no valor de {}, vencida em {}.",
            ctx.client_name, ctx.description, ctx.company_name, amount, due
        ),
        TemplateKind::Paid => {
            let paid_on = ctx.paid_on.map(date_only::to_br).unwrap_or_else(|| due.clone());
            return format!(
                "Olá, {}! Recebemos o pagamento de {} referente a \"{}\" (vencimento {}) em {}. Obrigado! {}",
                ctx.client_name, amount, ctx.description, due, paid_on, ctx.company_name
            );
        }
    };

    match (kind, ctx.copy_paste.as_deref(), ctx.pix_key.as_deref()) {
        (TemplateKind::PreGateway | TemplateKind::DueGateway | TemplateKind::LateGateway, Some(code), _) => {
            text.push_str("\n\nPague com Pix Copia e Cola:\n");
            text.push_str(code);
        }
        (_, _, Some(key)) => {
            text.push_str("\n\nChave Pix para pagamento: ");
            text.push_str(key);
        }
        _ => {}
    }

    text
}

/// `1234.5` -> `R$ 1.234,50`
pub fn format_brl(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let plain = format!("{:.2}", rounded.abs());
    let (int_part, frac_part) = plain.split_once('.').unwrap_or((plain.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    format!("{}R$ {},{}", if negative { "-" } else { "" }, grouped, frac_part)
}
