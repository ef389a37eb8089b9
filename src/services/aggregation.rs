// src/services/aggregation.rs

use sqlx::{PgConnection, PgPool};

use crate::{
    error::{AppError, survey_not_found},
    models::{
        question::{Question, StatisticsKind},
        statistics::{
            Breakdown, OptionCount, OptionStat, QuestionStatistics, SurveyStatistics, ValueCount,
            ValueStat,
        },
    },
    services::catalog,
};

/// Share of `count` in `total` as a percentage with two decimals.
///
/// Computed in integer hundredths and rounded half-up, so boundary values
/// such as 1/800 (0.125%) become 0.13 without floating-point drift.
pub fn percent(count: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    let (count, total) = (i128::from(count), i128::from(total));
    let hundredths = (2 * count * 10_000 + total) / (2 * total);
    hundredths as f64 / 100.0
}

/// Sum of counts, floored at 1 so an unanswered question yields 0% everywhere.
fn floored_total(counts: impl Iterator<Item = i64>) -> i64 {
    counts.sum::<i64>().max(1)
}

pub fn choice_breakdown(rows: Vec<OptionCount>) -> Breakdown {
    let total = floored_total(rows.iter().map(|r| r.count));
    Breakdown::Choices {
        options: rows
            .into_iter()
            .map(|r| OptionStat {
                percent: percent(r.count, total),
                id: r.id,
                text: r.text,
                count: r.count,
            })
            .collect(),
    }
}

pub fn value_breakdown(rows: Vec<ValueCount>) -> Breakdown {
    let total = floored_total(rows.iter().map(|r| r.count));
    Breakdown::Values {
        values: rows
            .into_iter()
            .map(|r| ValueStat {
                percent: percent(r.count, total),
                value: r.value,
                count: r.count,
            })
            .collect(),
    }
}

/// Computes statistics for every question of a survey, active or not.
///
/// Read-only; all queries share one repeatable-read snapshot.
pub async fn aggregate(pool: &PgPool, survey_id: i64) -> Result<SurveyStatistics, AppError> {
    let mut tx = pool.begin().await?;
    sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
        .execute(&mut *tx)
        .await?;

    let survey = catalog::find_survey(&mut tx, survey_id)
        .await?
        .ok_or_else(survey_not_found)?;

    let total_responses =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM responses WHERE survey_id = $1")
            .bind(survey_id)
            .fetch_one(&mut *tx)
            .await?;

    let questions = catalog::load_questions(&mut tx, survey_id).await?;

    let mut stats = Vec::with_capacity(questions.len());
    for question in questions {
        let breakdown = question_breakdown(&mut tx, &question).await?;
        stats.push(QuestionStatistics {
            id: question.id,
            text: question.text,
            question_type: question.question_type,
            breakdown,
        });
    }

    tx.commit().await?;

    Ok(SurveyStatistics {
        survey,
        total_responses,
        questions: stats,
    })
}

async fn question_breakdown(
    conn: &mut PgConnection,
    question: &Question,
) -> Result<Breakdown, AppError> {
    let breakdown = match question.question_type.statistics_kind() {
        StatisticsKind::Choices => {
            // Outer join keeps options nobody picked, with a count of 0.
            let rows = sqlx::query_as::<_, OptionCount>(
                r#"
                SELECT o.id, o.text, COUNT(a.id) AS count
                FROM options o
                LEFT JOIN answers a ON a.option_id = o.id
                WHERE o.question_id = $1
                GROUP BY o.id, o.text
                ORDER BY o.id
                "#,
            )
            .bind(question.id)
            .fetch_all(conn)
            .await?;

            choice_breakdown(rows)
        }
        StatisticsKind::GroupedValues => {
            let rows = sqlx::query_as::<_, ValueCount>(
                r#"
                SELECT text_answer AS value, COUNT(*) AS count
                FROM answers
                WHERE question_id = $1
                  AND text_answer IS NOT NULL
                  AND text_answer <> ''
                GROUP BY text_answer
                ORDER BY count DESC, value ASC
                "#,
            )
            .bind(question.id)
            .fetch_all(conn)
            .await?;

            value_breakdown(rows)
        }
        StatisticsKind::TextList => {
            let text_answers = sqlx::query_scalar::<_, String>(
                r#"
                SELECT text_answer
                FROM answers
                WHERE question_id = $1
                  AND text_answer IS NOT NULL
                  AND text_answer <> ''
                ORDER BY id
                "#,
            )
            .bind(question.id)
            .fetch_all(conn)
            .await?;

            Breakdown::TextAnswers { text_answers }
        }
    };

    Ok(breakdown)
}
