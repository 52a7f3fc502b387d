//! Company Service
//!
//! The tenant profile that is printed as the seller on invoices.

use std::sync::Arc;

use async_trait::async_trait;

use crate::application::dto::request::UpdateCompanyRequest;
use crate::domain::{CompanyRepository, MainCompany};
use crate::shared::error::AppError;

#[async_trait]
pub trait CompanyService: Send + Sync {
    async fn get(&self, company_id: i64) -> Result<MainCompany, AppError>;

    async fn update(&self, company_id: i64, update: UpdateCompanyRequest) -> Result<MainCompany, AppError>;
}

pub struct CompanyServiceImpl<C: CompanyRepository> {
    company_repo: Arc<C>,
}

impl<C: CompanyRepository> CompanyServiceImpl<C> {
    pub fn new(company_repo: Arc<C>) -> Self {
        Self { company_repo }
    }
}

/// Blank strings clear an optional field.
fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[async_trait]
impl<C: CompanyRepository + 'static> CompanyService for CompanyServiceImpl<C> {
    async fn get(&self, company_id: i64) -> Result<MainCompany, AppError> {
        self.company_repo
            .find_by_id(company_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Company not found".into()))
    }

    async fn update(&self, company_id: i64, update: UpdateCompanyRequest) -> Result<MainCompany, AppError> {
        let mut company = self.get(company_id).await?;

        if let Some(name) = update.name.and_then(non_blank) {
            company.name = name;
        }
        if let Some(v) = update.economic_code {
            company.economic_code = non_blank(v);
        }
        if let Some(v) = update.national_id {
            company.national_id = non_blank(v);
        }
        if let Some(v) = update.registration_number {
            company.registration_number = non_blank(v);
        }
        if let Some(v) = update.phone {
            company.phone = non_blank(v);
        }
        if let Some(v) = update.address {
            company.address = non_blank(v);
        }
        if let Some(v) = update.postal_code {
            company.postal_code = non_blank(v);
        }
        if let Some(v) = update.logo_url {
            company.logo_url = non_blank(v);
        }

        let company = self.company_repo.update(&company).await?;
        tracing::info!(company_id, "Company profile updated");
        Ok(company)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MockCompanyRepository;

    fn empty_update() -> UpdateCompanyRequest {
        UpdateCompanyRequest {
            name: None,
            economic_code: None,
            national_id: None,
            registration_number: None,
            phone: None,
            address: None,
            postal_code: None,
            logo_url: None,
        }
    }

    #[tokio::test]
    async fn test_update_clears_blank_fields() {
        let mut repo = MockCompanyRepository::new();
        repo.expect_find_by_id().returning(|id| {
            let mut c = MainCompany::new(id, "Pars");
            c.phone = Some("021-1234".into());
            Ok(Some(c))
        });
        repo.expect_update()
            .withf(|c| c.name == "Pars Trading" && c.phone.is_none())
            .times(1)
            .returning(|c| Ok(c.clone()));

        let service = CompanyServiceImpl::new(Arc::new(repo));
        let update = UpdateCompanyRequest {
            name: Some(" Pars Trading ".into()),
            phone: Some("  ".into()),
            ..empty_update()
        };
        let company = service.update(1, update).await.unwrap();
        assert_eq!(company.economic_code, None);
    }

    #[tokio::test]
    async fn test_get_missing_company() {
        let mut repo = MockCompanyRepository::new();
        repo.expect_find_by_id().returning(|_| Ok(None));

        let service = CompanyServiceImpl::new(Arc::new(repo));
        assert!(matches!(service.get(1).await, Err(AppError::NotFound(_))));
    }
}
