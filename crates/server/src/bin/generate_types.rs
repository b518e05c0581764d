//! Prints TypeScript declarations for every request and response model.
//! `cargo run --bin generate_types > shared/types.ts`

use db::models::{
    affiliate::{Affiliate, AffiliateStatus, CreateAffiliate},
    affiliate_click::AffiliateClick,
    affiliate_commission::{
        AffiliateCommission, AffiliatePayout, CommissionStatus, EarningsBreakdown,
    },
    affiliate_link::{AffiliateLink, CreateAffiliateLink},
    football_match::{CreateMatch, FootballMatch, MatchFilter, MatchStatus, UpdateScore},
    news::{
        CreateNewsArticle, CreateNewsComment, NewsArticle, NewsCategory, NewsComment, NewsFilter,
        UpdateNewsArticle,
    },
    prediction::{ContentSource, CreatePrediction, MatchOutcome, Prediction, PredictionAccuracy},
    profile::{CreateProfile, Profile, UpdateProfile},
    quiz::{
        CreateQuizQuestion, LeaderboardEntry, PublicQuizQuestion, QuizAnswer, QuizAnswerResult,
        QuizDifficulty, QuizResult, SubmitQuiz,
    },
};
use server::routes::{
    affiliates::{ReviewCommission, SetAffiliateStatus, SetLinkActive},
    football_data::FixturesQuery,
    health::HealthReport,
    matches::SetMatchStatus,
    news::SetPublished,
};
use services::services::{
    affiliate::{AffiliateLinkWithUrl, AffiliateStats, ClickOutcome, RecordConversion},
    database_validator::DatabaseHealth,
    news::GenerateArticle,
    predictions::GeneratePrediction,
};
use ts_rs::TS;

fn main() {
    let decls = [
        Profile::decl(),
        CreateProfile::decl(),
        UpdateProfile::decl(),
        AffiliateStatus::decl(),
        Affiliate::decl(),
        CreateAffiliate::decl(),
        AffiliateLink::decl(),
        CreateAffiliateLink::decl(),
        AffiliateLinkWithUrl::decl(),
        AffiliateClick::decl(),
        ClickOutcome::decl(),
        RecordConversion::decl(),
        CommissionStatus::decl(),
        AffiliateCommission::decl(),
        AffiliatePayout::decl(),
        EarningsBreakdown::decl(),
        AffiliateStats::decl(),
        SetAffiliateStatus::decl(),
        SetLinkActive::decl(),
        ReviewCommission::decl(),
        MatchStatus::decl(),
        FootballMatch::decl(),
        CreateMatch::decl(),
        MatchFilter::decl(),
        UpdateScore::decl(),
        SetMatchStatus::decl(),
        MatchOutcome::decl(),
        ContentSource::decl(),
        Prediction::decl(),
        CreatePrediction::decl(),
        PredictionAccuracy::decl(),
        GeneratePrediction::decl(),
        QuizDifficulty::decl(),
        CreateQuizQuestion::decl(),
        PublicQuizQuestion::decl(),
        QuizAnswer::decl(),
        QuizAnswerResult::decl(),
        SubmitQuiz::decl(),
        QuizResult::decl(),
        LeaderboardEntry::decl(),
        NewsCategory::decl(),
        NewsArticle::decl(),
        CreateNewsArticle::decl(),
        UpdateNewsArticle::decl(),
        NewsFilter::decl(),
        NewsComment::decl(),
        CreateNewsComment::decl(),
        SetPublished::decl(),
        GenerateArticle::decl(),
        FixturesQuery::decl(),
        DatabaseHealth::decl(),
        HealthReport::decl(),
    ];

    println!("// This file was generated by `generate_types`. Do not edit.\n");
    for decl in decls {
        println!("export {decl}\n");
    }
}
