//! Customer Service
//!
//! Individual and company customers together with their addresses, emails
//! and phone numbers. Contact sets are replaced wholesale on update and
//! always end up with exactly one primary entry.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::application::dto::request::{
    AddressRequest, CompanyCustomerRequest, EmailRequest, IndividualRequest, PhoneRequest,
};
use crate::domain::{
    Address, ContactInfo, ContactPhone, CustomerCompany, CustomerIndividual, CustomerRepository,
    EmailAddress, PhoneKind,
};
use crate::shared::error::AppError;
use crate::shared::pagination::{Page, PageParams};
use crate::shared::snowflake::SnowflakeGenerator;

#[async_trait]
pub trait CustomerService: Send + Sync {
    async fn list_individuals(
        &self,
        company_id: i64,
        search: Option<String>,
        page: PageParams,
    ) -> Result<Page<CustomerIndividual>, AppError>;

    async fn get_individual(&self, company_id: i64, id: i64) -> Result<CustomerIndividual, AppError>;

    async fn create_individual(
        &self,
        company_id: i64,
        request: IndividualRequest,
    ) -> Result<CustomerIndividual, AppError>;

    async fn update_individual(
        &self,
        company_id: i64,
        id: i64,
        request: IndividualRequest,
    ) -> Result<CustomerIndividual, AppError>;

    async fn delete_individual(&self, company_id: i64, id: i64) -> Result<(), AppError>;

    async fn list_companies(
        &self,
        company_id: i64,
        search: Option<String>,
        page: PageParams,
    ) -> Result<Page<CustomerCompany>, AppError>;

    async fn get_company(&self, company_id: i64, id: i64) -> Result<CustomerCompany, AppError>;

    async fn create_company(
        &self,
        company_id: i64,
        request: CompanyCustomerRequest,
    ) -> Result<CustomerCompany, AppError>;

    async fn update_company(
        &self,
        company_id: i64,
        id: i64,
        request: CompanyCustomerRequest,
    ) -> Result<CustomerCompany, AppError>;

    async fn delete_company(&self, company_id: i64, id: i64) -> Result<(), AppError>;
}

pub struct CustomerServiceImpl<R: CustomerRepository> {
    customer_repo: Arc<R>,
    id_generator: Arc<SnowflakeGenerator>,
}

fn individual_not_found(id: i64) -> AppError {
    AppError::NotFound(format!("Individual customer with id {} not found", id))
}

fn company_not_found(id: i64) -> AppError {
    AppError::NotFound(format!("Company customer with id {} not found", id))
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl<R: CustomerRepository> CustomerServiceImpl<R> {
    pub fn new(customer_repo: Arc<R>, id_generator: Arc<SnowflakeGenerator>) -> Self {
        Self {
            customer_repo,
            id_generator,
        }
    }

    /// Build the contact sets with fresh ids and a single primary per set.
    fn contacts(
        &self,
        addresses: Vec<AddressRequest>,
        emails: Vec<EmailRequest>,
        phones: Vec<PhoneRequest>,
    ) -> ContactInfo {
        let mut contacts = ContactInfo {
            addresses: addresses
                .into_iter()
                .map(|a| Address {
                    id: self.id_generator.generate(),
                    province: clean(a.province),
                    city: clean(a.city),
                    street: a.street.trim().to_string(),
                    postal_code: clean(a.postal_code),
                    is_primary: a.is_primary,
                })
                .collect(),
            emails: emails
                .into_iter()
                .map(|e| EmailAddress {
                    id: self.id_generator.generate(),
                    address: e.address.trim().to_lowercase(),
                    is_primary: e.is_primary,
                })
                .collect(),
            phones: phones
                .into_iter()
                .map(|p| ContactPhone {
                    id: self.id_generator.generate(),
                    number: p.number.trim().to_string(),
                    kind: p.kind.as_deref().map(PhoneKind::from_str).unwrap_or_default(),
                    is_primary: p.is_primary,
                })
                .collect(),
        };
        contacts.normalize();
        contacts
    }
}

#[async_trait]
impl<R: CustomerRepository + 'static> CustomerService for CustomerServiceImpl<R> {
    async fn list_individuals(
        &self,
        company_id: i64,
        search: Option<String>,
        page: PageParams,
    ) -> Result<Page<CustomerIndividual>, AppError> {
        let (items, total) = self
            .customer_repo
            .list_individuals(company_id, search, page)
            .await?;
        Ok(Page::new(items, total, page))
    }

    async fn get_individual(&self, company_id: i64, id: i64) -> Result<CustomerIndividual, AppError> {
        self.customer_repo
            .find_individual(company_id, id)
            .await?
            .ok_or_else(|| individual_not_found(id))
    }

    async fn create_individual(
        &self,
        company_id: i64,
        request: IndividualRequest,
    ) -> Result<CustomerIndividual, AppError> {
        let now = Utc::now();
        let customer = CustomerIndividual {
            id: self.id_generator.generate(),
            company_id,
            first_name: request.first_name.trim().to_string(),
            last_name: request.last_name.trim().to_string(),
            national_code: clean(request.national_code),
            birth_date: request.birth_date,
            description: clean(request.description),
            contacts: self.contacts(request.addresses, request.emails, request.phones),
            created_at: now,
            updated_at: now,
        };

        let customer = self.customer_repo.create_individual(&customer).await?;
        tracing::info!(company_id, customer_id = customer.id, "Individual customer created");
        Ok(customer)
    }

    async fn update_individual(
        &self,
        company_id: i64,
        id: i64,
        request: IndividualRequest,
    ) -> Result<CustomerIndividual, AppError> {
        let mut customer = self.get_individual(company_id, id).await?;

        customer.first_name = request.first_name.trim().to_string();
        customer.last_name = request.last_name.trim().to_string();
        customer.national_code = clean(request.national_code);
        customer.birth_date = request.birth_date;
        customer.description = clean(request.description);
        customer.contacts = self.contacts(request.addresses, request.emails, request.phones);

        self.customer_repo.update_individual(&customer).await
    }

    async fn delete_individual(&self, company_id: i64, id: i64) -> Result<(), AppError> {
        self.get_individual(company_id, id).await?;
        self.customer_repo.delete_individual(company_id, id).await?;
        tracing::info!(company_id, customer_id = id, "Individual customer deleted");
        Ok(())
    }

    async fn list_companies(
        &self,
        company_id: i64,
        search: Option<String>,
        page: PageParams,
    ) -> Result<Page<CustomerCompany>, AppError> {
        let (items, total) = self
            .customer_repo
            .list_companies(company_id, search, page)
            .await?;
        Ok(Page::new(items, total, page))
    }

    async fn get_company(&self, company_id: i64, id: i64) -> Result<CustomerCompany, AppError> {
        self.customer_repo
            .find_company(company_id, id)
            .await?
            .ok_or_else(|| company_not_found(id))
    }

    async fn create_company(
        &self,
        company_id: i64,
        request: CompanyCustomerRequest,
    ) -> Result<CustomerCompany, AppError> {
        let now = Utc::now();
        let customer = CustomerCompany {
            id: self.id_generator.generate(),
            company_id,
            name: request.name.trim().to_string(),
            economic_code: clean(request.economic_code),
            national_id: clean(request.national_id),
            registration_number: clean(request.registration_number),
            description: clean(request.description),
            contacts: self.contacts(request.addresses, request.emails, request.phones),
            created_at: now,
            updated_at: now,
        };

        let customer = self.customer_repo.create_company(&customer).await?;
        tracing::info!(company_id, customer_id = customer.id, "Company customer created");
        Ok(customer)
    }

    async fn update_company(
        &self,
        company_id: i64,
        id: i64,
        request: CompanyCustomerRequest,
    ) -> Result<CustomerCompany, AppError> {
        let mut customer = self.get_company(company_id, id).await?;

        customer.name = request.name.trim().to_string();
        customer.economic_code = clean(request.economic_code);
        customer.national_id = clean(request.national_id);
        customer.registration_number = clean(request.registration_number);
        customer.description = clean(request.description);
        customer.contacts = self.contacts(request.addresses, request.emails, request.phones);

        self.customer_repo.update_company(&customer).await
    }

    async fn delete_company(&self, company_id: i64, id: i64) -> Result<(), AppError> {
        self.get_company(company_id, id).await?;
        self.customer_repo.delete_company(company_id, id).await?;
        tracing::info!(company_id, customer_id = id, "Company customer deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MockCustomerRepository;
    use mockall::predicate::*;

    fn create_service(repo: MockCustomerRepository) -> CustomerServiceImpl<MockCustomerRepository> {
        CustomerServiceImpl::new(Arc::new(repo), Arc::new(SnowflakeGenerator::new(1, 0)))
    }

    fn create_test_request() -> IndividualRequest {
        IndividualRequest {
            first_name: " Ali ".into(),
            last_name: "Rezaei".into(),
            national_code: Some("0499370899".into()),
            birth_date: None,
            description: Some("   ".into()),
            addresses: vec![],
            emails: vec![
                EmailRequest {
                    address: "a@example.com".into(),
                    is_primary: false,
                },
                EmailRequest {
                    address: "B@Example.com".into(),
                    is_primary: true,
                },
                EmailRequest {
                    address: "c@example.com".into(),
                    is_primary: true,
                },
            ],
            phones: vec![PhoneRequest {
                number: "09121234567".into(),
                kind: Some("mobile".into()),
                is_primary: false,
            }],
        }
    }

    #[tokio::test]
    async fn test_create_individual_normalizes_contacts() {
        let mut repo = MockCustomerRepository::new();
        repo.expect_create_individual()
            .times(1)
            .returning(|c| Ok(c.clone()));

        let customer = create_service(repo)
            .create_individual(1, create_test_request())
            .await
            .unwrap();

        assert_eq!(customer.first_name, "Ali");
        assert_eq!(customer.description, None);
        assert_eq!(customer.company_id, 1);

        let primaries: Vec<_> = customer.contacts.emails.iter().map(|e| e.is_primary).collect();
        assert_eq!(primaries, vec![false, true, false]);
        assert_eq!(customer.contacts.primary_email(), Some("b@example.com"));

        // a lone unmarked phone becomes primary
        assert!(customer.contacts.phones[0].is_primary);
        assert_eq!(customer.contacts.phones[0].kind, PhoneKind::Mobile);
    }

    #[tokio::test]
    async fn test_update_individual_of_other_tenant_is_not_found() {
        let mut repo = MockCustomerRepository::new();
        repo.expect_find_individual()
            .with(eq(2), eq(5))
            .returning(|_, _| Ok(None));
        repo.expect_update_individual().never();

        let result = create_service(repo)
            .update_individual(2, 5, create_test_request())
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_company_in_use_is_conflict() {
        let mut repo = MockCustomerRepository::new();
        repo.expect_find_company().returning(|company_id, id| {
            let now = Utc::now();
            Ok(Some(CustomerCompany {
                id,
                company_id,
                name: "Acme".into(),
                economic_code: None,
                national_id: None,
                registration_number: None,
                description: None,
                contacts: ContactInfo::default(),
                created_at: now,
                updated_at: now,
            }))
        });
        repo.expect_delete_company()
            .returning(|_, _| Err(AppError::Conflict("Customer is referenced by invoices".into())));

        let result = create_service(repo).delete_company(1, 9).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }
}
